//! Text renderer for the UI frames.
//!
//! [`ConsoleRenderer`] lays each frame out as the lines the 128×32 panel
//! shows (status overlay on top, frame body below) and writes them to the
//! log whenever they change.  It is the [`FrameRenderer`] the firmware runs
//! with until a panel driver is wired in; the layout functions are shared
//! with it.

use core::fmt::Write;

use log::info;

use crate::render::{Frame, FrameRenderer, UiView};

/// Overlay line: link, activity and log icons plus the battery gauge.
pub fn overlay_line(view: &UiView) -> String {
    let mut line = String::new();
    line.push(if view.connected { 'W' } else { '-' });
    line.push(if view.activity { '*' } else { ' ' });
    line.push(if view.log_written { 'L' } else { ' ' });
    if let Some(pct) = view.battery_percent {
        let _ = write!(line, "  bat {pct}%");
    }
    line
}

/// Body of `frame`.
pub fn frame_body(frame: Frame, view: &UiView) -> String {
    match frame {
        Frame::Power => format!("CNT: {} W: {}", view.pulse_count, view.instant_power_w),
        Frame::Energy => format!(
            "E: {}.{:03} kWh",
            view.energy_wh / 1_000,
            view.energy_wh % 1_000
        ),
        Frame::Environment => match (view.temperature_c, view.humidity_pct) {
            (Some(t), Some(h)) => format!("T: {t:.1} C  RH: {h:.0}%"),
            _ => "T: --  RH: --".to_owned(),
        },
        Frame::Battery => match view.battery_percent {
            Some(pct) => format!("Battery: {pct}%"),
            None => "Battery: --".to_owned(),
        },
    }
}

pub struct ConsoleRenderer {
    last: String,
    powered: bool,
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            last: String::new(),
            powered: true,
        }
    }

    /// Most recently drawn screen.
    pub fn last_screen(&self) -> &str {
        &self.last
    }
}

impl FrameRenderer for ConsoleRenderer {
    fn draw(&mut self, frame: Frame, view: &UiView) {
        if !self.powered {
            return;
        }
        let screen = format!("{} | {}", overlay_line(view), frame_body(frame, view));
        if screen != self.last {
            info!("OLED  | {}", screen);
            self.last = screen;
        }
    }

    fn set_power(&mut self, on: bool) {
        self.powered = on;
        if !on {
            self.last.clear();
        }
    }
}
