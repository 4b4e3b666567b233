//! Port traits: the hexagonal boundary between the main loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Every external collaborator of the meter (network stack, HTTP server,
//! display, clock, log file, battery gauge, DHT sensor, beeper) is reached
//! through one of these traits.  The [`AppService`](super::service::AppService)
//! receives them as `&mut dyn` references in [`LoopPorts`], so the loop can
//! be driven in tests with mock adapters.
//!
//! ## Contract
//!
//! - No port method may block.  Anything slow (connect, NTP, DHT handshake)
//!   is started here and completed in the background or on a later call.
//! - Failures are reported as typed errors and never abort the iteration.

use serde::Serialize;

use crate::api::{ApiResponse, Route};
use crate::drivers::button::ButtonEvent;
use crate::error::{CommsError, SensorError, StorageError};
use crate::logbook::LogRecord;
use crate::render::UiView;
use crate::scheduler::TaskId;

// ───────────────────────────────────────────────────────────────
// Connectivity (driven adapter: domain → WiFi)
// ───────────────────────────────────────────────────────────────

/// Link state reported by the connectivity adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Station mode, associated and holding an IP.
    Connected,
    /// Station mode, not (yet) associated.
    Disconnected,
    /// Serving the provisioning access point; station reconnects are off.
    AccessPoint,
}

/// Station-mode connectivity.
pub trait ConnectivityPort {
    fn status(&self) -> LinkStatus;

    /// Kick off one reconnect attempt and return immediately.
    fn begin_connect(&mut self) -> Result<(), ConnectivityError>;
}

/// Errors from [`ConnectivityPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// No station credentials are stored.
    NoCredentials,
    /// The driver refused the request.
    Driver,
}

// ───────────────────────────────────────────────────────────────
// Service discovery (driven adapter: domain → mDNS)
// ───────────────────────────────────────────────────────────────

/// Name resolution / service advertisement.
pub trait ServicePort {
    /// Register the host name and services.  Called once the link is up.
    fn start(&mut self) -> Result<(), CommsError>;

    /// Per-iteration housekeeping.  Must be cheap when nothing is pending.
    fn maintain(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Inbound requests (driving adapter: HTTP → domain)
// ───────────────────────────────────────────────────────────────

/// Queue of HTTP requests accepted by the server but not yet answered.
pub trait RequestPort {
    /// Next queued request, if any.  Never waits for one.
    fn poll_request(&mut self) -> Option<Route>;

    /// Answer the request most recently returned by `poll_request`.
    fn respond(&mut self, response: ApiResponse);
}

// ───────────────────────────────────────────────────────────────
// User input (driving adapter: buttons → domain)
// ───────────────────────────────────────────────────────────────

/// The two front-panel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    Menu,
    Enter,
}

/// Debounced, gesture-classified button input.
pub trait InputPort {
    fn poll(&mut self, button: ButtonId, now_ms: u32) -> Option<ButtonEvent>;
}

// ───────────────────────────────────────────────────────────────
// Rendering (driven adapter: domain → display)
// ───────────────────────────────────────────────────────────────

/// Time-sliced UI.
pub trait RenderPort {
    /// Run exactly one rendering step and return the frame budget left
    /// over, in milliseconds.  0 means the frame deadline was consumed.
    fn advance(&mut self, now_ms: u32, view: &UiView) -> u32;

    fn next_frame(&mut self);

    fn previous_frame(&mut self);

    fn set_display_power(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Wall clock (driven adapter: domain → SNTP)
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Start synchronisation.  Called once the link is up.
    fn begin(&mut self);

    /// Give the sync client a chance to refresh.  Non-blocking.
    fn update(&mut self);

    /// Unix time in seconds, or `None` until the clock has been synced.
    fn epoch_secs(&self) -> Option<u32>;
}

// ───────────────────────────────────────────────────────────────
// Persistent log (driven adapter: domain → flash filesystem)
// ───────────────────────────────────────────────────────────────

/// Append-only power log on the data partition, which also holds the web
/// UI files the HTTP surface serves.
pub trait LogStorePort {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError>;

    /// Delete the whole log.  A missing log is not an error.
    fn remove(&mut self) -> Result<(), StorageError>;

    /// Whole log as text.  A missing log reads as empty.
    fn read_all(&self) -> Result<String, StorageError>;

    /// Contents of `path`, relative to the partition root.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Battery, environment, alert
// ───────────────────────────────────────────────────────────────

pub trait BatteryPort {
    /// Advance the charge estimate.  Cheap; called every spare iteration.
    fn update(&mut self, now_ms: u32);

    /// Estimated charge, 0–100 %.
    fn percent(&self) -> Option<u8>;
}

/// One temperature / humidity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

pub trait EnvSensorPort {
    fn sample(&mut self) -> Result<EnvReading, SensorError>;
}

/// Audible alert sequencer.
pub trait AlertPort {
    /// Advance the current beep sequence.
    fn update(&mut self, now_ms: u32);

    /// Queue `count` beeps.
    fn request(&mut self, count: u8, now_ms: u32) -> Result<(), AlertError>;

    fn is_busy(&self) -> bool;
}

/// Errors from [`AlertPort::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertError {
    /// A sequence is already playing.
    Busy,
    /// Zero beeps requested.
    InvalidCount,
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Callback the [`TaskTable`](crate::scheduler::TaskTable) invokes for each
/// due task.  The table owns timing; the delegate owns the work.
pub trait TaskDelegate {
    fn on_task_due(&mut self, id: TaskId, now_ms: u32) -> TaskOutcome;
}

/// What the table should do after a task ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Done,
    /// Arm another (one-shot) task, starting its interval now.
    Arm(TaskId),
}

// ───────────────────────────────────────────────────────────────
// Bundle
// ───────────────────────────────────────────────────────────────

/// Every collaborator one loop iteration talks to.
pub struct LoopPorts<'a> {
    pub connectivity: &'a mut dyn ConnectivityPort,
    pub services: &'a mut dyn ServicePort,
    pub requests: &'a mut dyn RequestPort,
    pub input: &'a mut dyn InputPort,
    pub render: &'a mut dyn RenderPort,
    pub clock: &'a mut dyn ClockPort,
    pub log_store: &'a mut dyn LogStorePort,
    pub battery: &'a mut dyn BatteryPort,
    pub environment: &'a mut dyn EnvSensorPort,
    pub alert: &'a mut dyn AlertPort,
    pub sink: &'a mut dyn EventSink,
}
