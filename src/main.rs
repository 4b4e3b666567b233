//! PowerMeter Firmware: Main Entry Point
//!
//! Pulse-counting power meter on a cooperative, time-budgeted main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter    MdnsAdapter    RequestQueue    SntpClock       │
//! │  (Connectivity) (Service)      (HTTP requests) (Clock)         │
//! │  FrontPanel     FramePacer     FileLogStore    Dht11           │
//! │  (Input)        (Render)       (Log store)     (Environment)   │
//! │  Beeper         BatteryGauge   LogEventSink                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  TaskTable · PulseMeter · HTTP API                     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Pulse ISR ──▶ PulseCounter (critical-section shared state)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::Path;

use anyhow::{anyhow, Result};
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::{
    delay::FreeRtos,
    gpio::{PinDriver, Pull},
    peripherals::Peripherals,
};
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use powermeter::adapters::battery::BatteryGauge;
use powermeter::adapters::clock::{SntpClock, SystemClock};
use powermeter::adapters::display::ConsoleRenderer;
use powermeter::adapters::environment::Dht11;
use powermeter::adapters::http::{register_routes, RequestBridge};
use powermeter::adapters::log_sink::LogEventSink;
use powermeter::adapters::log_store::{mount_data_partition, FileLogStore, DATA_MOUNT_POINT};
use powermeter::adapters::mdns::{MdnsAdapter, DEFAULT_HOSTNAME};
use powermeter::adapters::wifi::{WifiAdapter, WifiCredentials, WIFI_CONF_FILE};
use powermeter::app::ports::LoopPorts;
use powermeter::app::service::AppService;
use powermeter::config::MeterConfig;
use powermeter::drivers::beeper::Beeper;
use powermeter::drivers::button::{ActiveLevel, ButtonDriver, ButtonIsr, FrontPanel};
use powermeter::drivers::hw_init::{self, uptime_ms, PulseInput};
use powermeter::drivers::watchdog::{Watchdog, WATCHDOG_TIMEOUT_MS};
use powermeter::metering::{PulseCounter, PulseMeter};
use powermeter::pins;
use powermeter::render::FramePacer;
use powermeter::scheduler::elapsed_ms;

// ── ISR-shared state ──────────────────────────────────────────
//
// The interrupt handlers receive a pointer to these through their
// argument, so they must live for the whole program.
static COUNTER: PulseCounter = PulseCounter::new(&MeterConfig::DEFAULT);
static MENU_ISR: ButtonIsr = ButtonIsr::new();
static ENTER_ISR: ButtonIsr = ButtonIsr::new();

// Shared by the httpd task and the main loop.
static HTTP_BRIDGE: RequestBridge = RequestBridge::new();

const HEARTBEAT_INTERVAL_MS: u32 = 60_000;

fn load_credentials() -> Option<WifiCredentials> {
    let path = Path::new(DATA_MOUNT_POINT).join(WIFI_CONF_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => match WifiCredentials::parse(&text) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!("{}: {}; starting setup AP", path.display(), e);
                None
            }
        },
        Err(_) => {
            info!("No {} on the data partition; starting setup AP", WIFI_CONF_FILE);
            None
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PowerMeter v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = MeterConfig::DEFAULT;
    config.validate().map_err(|e| anyhow!("meter config: {e}"))?;

    // ── 1b. Initialise hardware peripherals ───────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {e}"))?;
    let mut watchdog = Watchdog::new(WATCHDOG_TIMEOUT_MS);

    // ── 2. Data partition + WiFi credentials ──────────────────
    if let Err(e) = mount_data_partition() {
        // Keep metering; log appends will report Unavailable.
        warn!("Data partition unavailable ({}), logging disabled", e);
    }
    let credentials = load_credentials();

    // ── 3. Metering ───────────────────────────────────────────
    let mut pulse_input = PulseInput::new(pins::PULSE_INPUT_GPIO);
    let meter = PulseMeter::init(&COUNTER, &mut pulse_input, &config, uptime_ms())
        .map_err(|e| anyhow!("pulse input: {e}"))?;

    // ── 4. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut wifi = WifiAdapter::new(esp_wifi, credentials)?;

    let mut hostname = heapless::String::new();
    hostname
        .push_str(DEFAULT_HOSTNAME)
        .map_err(|_| anyhow!("hostname too long"))?;
    let mut mdns = MdnsAdapter::new(hostname);

    let (http_handle, mut requests) = HTTP_BRIDGE.split();
    let mut http = EspHttpServer::new(&HttpConfig {
        uri_match_wildcard: true,
        ..Default::default()
    })?;
    register_routes(&mut http, http_handle)?;

    // Front panel (see pins.rs: menu GPIO14 active-low, enter GPIO15 active-high).
    let mut menu_pin = PinDriver::input(peripherals.pins.gpio14)?;
    menu_pin.set_pull(Pull::Up)?;
    let enter_pin = PinDriver::input(peripherals.pins.gpio15)?;
    hw_init::attach_button_isr(pins::MENU_BUTTON_GPIO, true, &MENU_ISR)
        .map_err(|e| anyhow!("menu button: {e}"))?;
    hw_init::attach_button_isr(pins::ENTER_BUTTON_GPIO, false, &ENTER_ISR)
        .map_err(|e| anyhow!("enter button: {e}"))?;
    let mut panel = FrontPanel {
        menu: ButtonDriver::new(menu_pin, ActiveLevel::Low, &MENU_ISR),
        enter: ButtonDriver::new(enter_pin, ActiveLevel::High, &ENTER_ISR),
    };

    let mut beeper = Beeper::new(PinDriver::output(peripherals.pins.gpio13)?);
    let mut pacer = FramePacer::new(ConsoleRenderer::new(), SystemClock, config.frame_interval_ms());
    let mut clock = SntpClock::new();
    let mut log_store = FileLogStore::new(DATA_MOUNT_POINT);
    let mut battery = BatteryGauge::new(|| hw_init::adc1_read(pins::BATTERY_ADC_CHANNEL));
    let mut dht = Dht11::new(pins::DHT_GPIO);
    let mut log_sink = LogEventSink::new();

    let mut ports = LoopPorts {
        connectivity: &mut wifi,
        services: &mut mdns,
        requests: &mut requests,
        input: &mut panel,
        render: &mut pacer,
        clock: &mut clock,
        log_store: &mut log_store,
        battery: &mut battery,
        environment: &mut dht,
        alert: &mut beeper,
        sink: &mut log_sink,
    };

    // ── 5. Construct app service ──────────────────────────────
    let boot_ms = uptime_ms();
    let mut app = AppService::new(meter, config, boot_ms);
    app.start(boot_ms, &mut ports);

    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    let mut last_heartbeat = boot_ms;
    loop {
        watchdog.feed();
        let now_ms = uptime_ms();
        let report = app.iterate(now_ms, &mut ports);

        if elapsed_ms(now_ms, last_heartbeat) >= HEARTBEAT_INTERVAL_MS {
            last_heartbeat = now_ms;
            info!(
                "Heartbeat: {} iterations, {} pulses, {} W, link {:?}, budget {} ms",
                app.iterations(),
                app.meter().count(),
                app.meter().instant_power(),
                app.link(),
                report.frame_budget_ms
            );
        }

        // Yield so the idle task (and its watchdog) and the network stack run.
        FreeRtos::delay_ms(1);
    }
}
