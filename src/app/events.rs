//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::error::{SensorError, StorageError};
use crate::metering::activity::ActivityState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The main loop is about to run its first iteration.
    Started { now_ms: u32 },

    /// A station reconnect attempt was started.
    Connecting,

    /// The station link came up.  Services are started on the first one.
    LinkUp,

    /// The station link dropped.
    LinkDown,

    /// A log record was appended.
    LogWritten { epoch_secs: u32, watts: u32 },

    /// A log slot passed without a synced clock.
    LogSkipped,

    /// The log store rejected a record or removal.
    LogFailed(StorageError),

    /// The user cleared the meter.
    MeterCleared { pulses: u32 },

    /// The pulse-activity icon changed.
    ActivityChanged(ActivityState),

    /// The display was switched on or off.
    DisplayToggled { on: bool },

    /// New temperature / humidity sample.
    EnvironmentSampled { temperature_c: f32, humidity_pct: f32 },

    /// The environment sensor could not be read; the last reading stays.
    SensorFailed(SensorError),
}
