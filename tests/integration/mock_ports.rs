//! Mock adapters for every loop port.
//!
//! Each mock records what the service asked of it so tests can assert on
//! the full call history, and exposes plain fields for scripting its
//! answers (link state, frame budget, clock sync, sensor readings).

use std::collections::{HashMap, VecDeque};

use powermeter::api::{ApiResponse, Route};
use powermeter::app::events::AppEvent;
use powermeter::app::ports::{
    AlertError, AlertPort, BatteryPort, ButtonId, ClockPort, ConnectivityError, ConnectivityPort,
    EnvReading, EnvSensorPort, EventSink, InputPort, LinkStatus, LogStorePort, LoopPorts,
    RenderPort, RequestPort, ServicePort,
};
use powermeter::config::MeterConfig;
use powermeter::drivers::button::ButtonEvent;
use powermeter::error::{CommsError, SensorError, StorageError};
use powermeter::logbook::LogRecord;
use powermeter::metering::{EdgeInput, PulseCounter, PulseMeter};
use powermeter::render::UiView;

// ── Metering ──────────────────────────────────────────────────

/// Edge input that just remembers the counter, so tests can fire edges.
#[derive(Default)]
pub struct ScriptedEdges {
    pub counter: Option<&'static PulseCounter>,
}

impl EdgeInput for ScriptedEdges {
    type Error = core::convert::Infallible;

    fn attach(&mut self, counter: &'static PulseCounter) -> Result<(), Self::Error> {
        self.counter = Some(counter);
        Ok(())
    }
}

/// A fresh meter over its own leaked counter, initialised at `now_ms`.
pub fn meter_at(now_ms: u32) -> (&'static PulseCounter, PulseMeter) {
    let config = MeterConfig::DEFAULT;
    let counter: &'static PulseCounter = Box::leak(Box::new(PulseCounter::new(&config)));
    let mut edges = ScriptedEdges::default();
    let Ok(meter) = PulseMeter::init(counter, &mut edges, &config, now_ms);
    (counter, meter)
}

// ── Connectivity ──────────────────────────────────────────────

pub struct MockLink {
    pub status: LinkStatus,
    pub connect_calls: u32,
}

impl MockLink {
    pub fn new(status: LinkStatus) -> Self {
        Self {
            status,
            connect_calls: 0,
        }
    }
}

impl ConnectivityPort for MockLink {
    fn status(&self) -> LinkStatus {
        self.status
    }

    fn begin_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.status == LinkStatus::AccessPoint {
            return Err(ConnectivityError::NoCredentials);
        }
        self.connect_calls += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockServices {
    pub starts: u32,
    pub maintains: u32,
    pub fail_start: bool,
}

impl ServicePort for MockServices {
    fn start(&mut self) -> Result<(), CommsError> {
        self.starts += 1;
        if self.fail_start {
            return Err(CommsError::MdnsFailed);
        }
        Ok(())
    }

    fn maintain(&mut self) {
        self.maintains += 1;
    }
}

// ── HTTP ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRequests {
    pub pending: VecDeque<Route>,
    pub responses: Vec<ApiResponse>,
}

impl RequestPort for MockRequests {
    fn poll_request(&mut self) -> Option<Route> {
        self.pending.pop_front()
    }

    fn respond(&mut self, response: ApiResponse) {
        self.responses.push(response);
    }
}

// ── Buttons ───────────────────────────────────────────────────

/// Scripted gestures, delivered one per poll of the matching button.
#[derive(Default)]
pub struct MockInput {
    pub script: VecDeque<(ButtonId, ButtonEvent)>,
}

impl MockInput {
    pub fn press(&mut self, button: ButtonId, event: ButtonEvent) {
        self.script.push_back((button, event));
    }
}

impl InputPort for MockInput {
    fn poll(&mut self, button: ButtonId, _now_ms: u32) -> Option<ButtonEvent> {
        let pos = self.script.iter().position(|(b, _)| *b == button)?;
        self.script.remove(pos).map(|(_, event)| event)
    }
}

// ── Rendering ─────────────────────────────────────────────────

/// Renderer with a scripted frame budget.
pub struct MockRender {
    pub budget_ms: u32,
    pub advances: u32,
    pub next_frames: u32,
    pub previous_frames: u32,
    pub power: Vec<bool>,
    pub last_view: Option<UiView>,
}

impl MockRender {
    pub fn with_budget(budget_ms: u32) -> Self {
        Self {
            budget_ms,
            advances: 0,
            next_frames: 0,
            previous_frames: 0,
            power: Vec::new(),
            last_view: None,
        }
    }
}

impl RenderPort for MockRender {
    fn advance(&mut self, _now_ms: u32, view: &UiView) -> u32 {
        self.advances += 1;
        self.last_view = Some(*view);
        self.budget_ms
    }

    fn next_frame(&mut self) {
        self.next_frames += 1;
    }

    fn previous_frame(&mut self) {
        self.previous_frames += 1;
    }

    fn set_display_power(&mut self, on: bool) {
        self.power.push(on);
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    pub epoch: Option<u32>,
    pub begins: u32,
    pub updates: u32,
}

impl ClockPort for MockClock {
    fn begin(&mut self) {
        self.begins += 1;
    }

    fn update(&mut self) {
        self.updates += 1;
    }

    fn epoch_secs(&self) -> Option<u32> {
        self.epoch
    }
}

// ── Log store ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLogStore {
    pub records: Vec<LogRecord>,
    pub removes: u32,
    pub fail_with: Option<StorageError>,
    /// Web UI files on the data partition, by path.
    pub files: HashMap<String, Vec<u8>>,
}

impl LogStorePort for MockLogStore {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        self.records.push(*record);
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.removes += 1;
        self.records.clear();
        match self.fail_with {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn read_all(&self) -> Result<String, StorageError> {
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        Ok(self.records.iter().map(ToString::to_string).collect())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files.get(path).cloned().ok_or(StorageError::Unavailable)
    }
}

// ── Battery / environment / beeper ────────────────────────────

#[derive(Default)]
pub struct MockBattery {
    pub percent: Option<u8>,
    pub updates: u32,
}

impl BatteryPort for MockBattery {
    fn update(&mut self, _now_ms: u32) {
        self.updates += 1;
    }

    fn percent(&self) -> Option<u8> {
        self.percent
    }
}

pub struct MockEnv {
    pub next: Result<EnvReading, SensorError>,
    pub samples: u32,
}

impl Default for MockEnv {
    fn default() -> Self {
        Self {
            next: Ok(EnvReading {
                temperature_c: 21.5,
                humidity_pct: 45.0,
            }),
            samples: 0,
        }
    }
}

impl EnvSensorPort for MockEnv {
    fn sample(&mut self) -> Result<EnvReading, SensorError> {
        self.samples += 1;
        self.next
    }
}

#[derive(Default)]
pub struct MockAlert {
    pub busy: bool,
    pub requests: Vec<u8>,
    pub updates: u32,
}

impl AlertPort for MockAlert {
    fn update(&mut self, _now_ms: u32) {
        self.updates += 1;
    }

    fn request(&mut self, count: u8, _now_ms: u32) -> Result<(), AlertError> {
        if self.busy {
            return Err(AlertError::Busy);
        }
        if count == 0 {
            return Err(AlertError::InvalidCount);
        }
        self.requests.push(count);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.busy
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Every mock in one place; [`Rig::ports`] lends them to the service.
pub struct Rig {
    pub link: MockLink,
    pub services: MockServices,
    pub requests: MockRequests,
    pub input: MockInput,
    pub render: MockRender,
    pub clock: MockClock,
    pub log_store: MockLogStore,
    pub battery: MockBattery,
    pub environment: MockEnv,
    pub alert: MockAlert,
    pub sink: RecordingSink,
}

impl Rig {
    pub fn new(link: LinkStatus) -> Self {
        Self {
            link: MockLink::new(link),
            services: MockServices::default(),
            requests: MockRequests::default(),
            input: MockInput::default(),
            render: MockRender::with_budget(50),
            clock: MockClock::default(),
            log_store: MockLogStore::default(),
            battery: MockBattery::default(),
            environment: MockEnv::default(),
            alert: MockAlert::default(),
            sink: RecordingSink::default(),
        }
    }

    pub fn ports(&mut self) -> LoopPorts<'_> {
        LoopPorts {
            connectivity: &mut self.link,
            services: &mut self.services,
            requests: &mut self.requests,
            input: &mut self.input,
            render: &mut self.render,
            clock: &mut self.clock,
            log_store: &mut self.log_store,
            battery: &mut self.battery,
            environment: &mut self.environment,
            alert: &mut self.alert,
            sink: &mut self.sink,
        }
    }
}
