//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements        | Connects to                      |
//! |---------------|-------------------|----------------------------------|
//! | `battery`     | BatteryPort       | ADC1 battery divider             |
//! | `clock`       | ClockPort         | SNTP / system timer              |
//! |               | TickSource        |                                  |
//! | `display`     | FrameRenderer     | Serial log (panel stand-in)      |
//! | `environment` | EnvSensorPort     | DHT11 single-wire sensor         |
//! | `http`        | RequestPort       | ESP-IDF HTTP server task         |
//! | `log_sink`    | EventSink         | Serial log output                |
//! | `log_store`   | LogStorePort      | SPIFFS data partition (VFS)      |
//! | `mdns`        | ServicePort       | ESP-IDF mDNS responder           |
//! | `wifi`        | ConnectivityPort  | ESP-IDF WiFi STA / setup AP      |

pub mod battery;
pub mod clock;
pub mod display;
pub mod environment;
pub mod http;
pub mod log_sink;
pub mod log_store;
pub mod mdns;
pub mod wifi;
