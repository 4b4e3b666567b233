//! The main loop over the real host-build adapters.
//!
//! WiFi, mDNS and SNTP run their simulation paths, the log store writes to
//! a scratch directory, and the HTTP queue is fed from a second thread the
//! way the server task feeds it on the device.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::{ErrorType, OutputPin};

use powermeter::adapters::battery::BatteryGauge;
use powermeter::adapters::clock::{EPOCH_2020, SntpClock};
use powermeter::adapters::display::ConsoleRenderer;
use powermeter::adapters::environment::Dht11;
use powermeter::adapters::http::RequestBridge;
use powermeter::adapters::log_store::FileLogStore;
use powermeter::adapters::mdns::{DEFAULT_HOSTNAME, MdnsAdapter};
use powermeter::adapters::wifi::{WifiAdapter, WifiCredentials};
use powermeter::api::Route;
use powermeter::app::commands::AppCommand;
use powermeter::app::events::AppEvent;
use powermeter::app::ports::{LinkStatus, LogStorePort, LoopPorts};
use powermeter::app::service::AppService;
use powermeter::config::MeterConfig;
use powermeter::drivers::beeper::Beeper;
use powermeter::logbook;
use powermeter::pins;
use powermeter::render::{FramePacer, TickSource};

use crate::mock_ports::{meter_at, MockInput, RecordingSink};

#[derive(Clone, Default)]
struct TestTicks(Rc<Cell<u32>>);

impl TickSource for TestTicks {
    fn now_ms(&self) -> u32 {
        self.0.get()
    }
}

#[derive(Default)]
struct QuietPin;

impl ErrorType for QuietPin {
    type Error = Infallible;
}

impl OutputPin for QuietPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

#[test]
fn boot_connect_log_and_serve() {
    let dir = std::env::temp_dir().join(format!("powermeter-sim-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let (counter, meter) = meter_at(0);
    let creds = WifiCredentials::new("HomeNet", "password123").unwrap();
    let mut wifi = WifiAdapter::new(Some(creds));
    let mut hostname = heapless::String::new();
    hostname.push_str(DEFAULT_HOSTNAME).unwrap();
    let mut mdns = MdnsAdapter::new(hostname);
    let bridge: &'static RequestBridge = Box::leak(Box::new(RequestBridge::new()));
    let (handle, mut requests) = bridge.split();
    let mut input = MockInput::default();
    let ticks = TestTicks::default();
    let mut pacer = FramePacer::new(ConsoleRenderer::new(), ticks.clone(), MeterConfig::DEFAULT.frame_interval_ms());
    let mut clock = SntpClock::new();
    let mut store = FileLogStore::new(&dir);
    let mut battery = BatteryGauge::new(|| Some(3_900));
    let mut dht = Dht11::new(pins::DHT_GPIO);
    let mut beeper = Beeper::new(QuietPin);
    let mut sink = RecordingSink::default();

    let mut app = AppService::new(meter, MeterConfig::DEFAULT, 0);
    {
        let mut ports = LoopPorts {
            connectivity: &mut wifi,
            services: &mut mdns,
            requests: &mut requests,
            input: &mut input,
            render: &mut pacer,
            clock: &mut clock,
            log_store: &mut store,
            battery: &mut battery,
            environment: &mut dht,
            alert: &mut beeper,
            sink: &mut sink,
        };
        app.start(0, &mut ports);

        let mut now = 0;
        while now <= 10_000 {
            match now {
                5_000 | 5_360 => counter.on_edge(now),
                _ => {}
            }
            ticks.0.set(now);
            app.iterate(now, &mut ports);
            now += 10;
        }
        now -= 10;
        assert_eq!(app.link(), LinkStatus::Connected);
        assert!(app.log_written());

        // Keep the loop turning (clock held, so no task comes due again)
        // until the server thread has its answer.
        let server = thread::spawn(move || handle.submit(Route::Watts, Duration::from_secs(10)));
        for _ in 0..100_000 {
            if server.is_finished() {
                break;
            }
            app.iterate(now, &mut ports);
            thread::yield_now();
        }
        let response = server.join().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, br#"{"watts":1000}"#);

        app.handle_command(AppCommand::ClearMetering, &mut ports);
    }

    assert_eq!(wifi.attempts(), 1);
    assert!(mdns.is_active());
    assert!(pacer.frames_drawn() > 0);
    assert!(app.environment().is_some());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::LogWritten { watts: 1_000, .. })),
        1
    );
    let written = sink.events.iter().find_map(|e| match e {
        AppEvent::LogWritten { epoch_secs, .. } => Some(*epoch_secs),
        _ => None,
    });
    assert!(written.is_some_and(|secs| secs >= EPOCH_2020));

    // Clearing removed the log file along with the count.
    assert_eq!(app.meter().count(), 0);
    assert!(!store.path().exists());
    assert_eq!(logbook::records(&store.read_all().unwrap()).count(), 0);
    std::fs::remove_dir_all(dir).ok();
}
