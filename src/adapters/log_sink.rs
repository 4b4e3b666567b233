//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { now_ms } => info!("START | t={}ms", now_ms),
            AppEvent::Connecting => info!("WIFI  | connecting"),
            AppEvent::LinkUp => info!("WIFI  | link up"),
            AppEvent::LinkDown => warn!("WIFI  | link down"),
            AppEvent::LogWritten { epoch_secs, watts } => {
                info!("LOG   | {},{}", epoch_secs, watts);
            }
            AppEvent::LogSkipped => info!("LOG   | skipped, clock not synced"),
            AppEvent::LogFailed(e) => warn!("LOG   | {}", e),
            AppEvent::MeterCleared { pulses } => info!("METER | cleared after {} pulses", pulses),
            AppEvent::ActivityChanged(state) => info!("METER | activity {:?}", state),
            AppEvent::DisplayToggled { on } => {
                info!("UI    | display {}", if *on { "on" } else { "off" });
            }
            AppEvent::EnvironmentSampled {
                temperature_c,
                humidity_pct,
            } => {
                info!("ENV   | T={:.1}\u{00b0}C RH={:.0}%", temperature_c, humidity_pct);
            }
            AppEvent::SensorFailed(e) => warn!("ENV   | {}", e),
        }
    }
}
