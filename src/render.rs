//! Time-sliced UI rendering.
//!
//! [`FramePacer`] turns an external [`FrameRenderer`] into the loop's
//! rendering step.  Each call to [`FramePacer::advance`] either draws one
//! frame (when the frame interval has elapsed) or does nothing, and returns
//! how much of the current frame interval is still unspent:
//!
//! ```text
//!   budget = frame_interval − (now − last_draw)
//!   budget ≤ 0  →  draw, last_draw = now
//!   return frame_interval − time spent drawing   (saturating at 0)
//! ```
//!
//! A return of 0 means the draw overran its slot and the loop must skip
//! its low-priority work this iteration.

use log::{debug, info};

use crate::app::ports::RenderPort;
use crate::scheduler::elapsed_ms;

/// Screens the menu button cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Instantaneous load.
    Power,
    /// Energy since the last clear.
    Energy,
    /// Temperature and humidity.
    Environment,
    /// Battery charge.
    Battery,
}

impl Frame {
    pub const ALL: [Frame; 4] = [Frame::Power, Frame::Energy, Frame::Environment, Frame::Battery];

    pub fn next(self) -> Self {
        let i = self.index();
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        let i = self.index();
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

/// Everything the UI shows.  Built by the main loop from snapshots; the
/// renderer never touches metering state directly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UiView {
    pub pulse_count: u32,
    pub instant_power_w: u32,
    /// Energy since the last clear, in watt-hours.
    pub energy_wh: u32,
    /// Debounced "pulses arriving" icon.
    pub activity: bool,
    /// "Log just written" icon.
    pub log_written: bool,
    pub connected: bool,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub battery_percent: Option<u8>,
}

/// The drawing engine.
pub trait FrameRenderer {
    /// Draw `frame` plus the status overlay.
    fn draw(&mut self, frame: Frame, view: &UiView);

    fn set_power(&mut self, on: bool);
}

/// Monotonic millisecond tick, read before and after drawing.
pub trait TickSource {
    fn now_ms(&self) -> u32;
}

/// Frame-rate governor around a [`FrameRenderer`].
pub struct FramePacer<R, T> {
    renderer: R,
    ticks: T,
    frame_interval_ms: u32,
    last_draw_ms: Option<u32>,
    frame: Frame,
    display_on: bool,
    frames_drawn: u32,
}

impl<R: FrameRenderer, T: TickSource> FramePacer<R, T> {
    pub fn new(renderer: R, ticks: T, frame_interval_ms: u32) -> Self {
        info!("UI: {} ms frame interval", frame_interval_ms);
        Self {
            renderer,
            ticks,
            frame_interval_ms,
            last_draw_ms: None,
            frame: Frame::Power,
            display_on: true,
            frames_drawn: 0,
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn frames_drawn(&self) -> u32 {
        self.frames_drawn
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn frame_due(&self, now_ms: u32) -> bool {
        match self.last_draw_ms {
            None => true,
            Some(last) => elapsed_ms(now_ms, last) >= self.frame_interval_ms,
        }
    }
}

impl<R: FrameRenderer, T: TickSource> RenderPort for FramePacer<R, T> {
    fn advance(&mut self, now_ms: u32, view: &UiView) -> u32 {
        let start = self.ticks.now_ms();
        if self.frame_due(now_ms) {
            self.last_draw_ms = Some(now_ms);
            if self.display_on {
                self.renderer.draw(self.frame, view);
            }
            self.frames_drawn = self.frames_drawn.wrapping_add(1);
        }
        let spent = elapsed_ms(self.ticks.now_ms(), start);
        self.frame_interval_ms.saturating_sub(spent)
    }

    fn next_frame(&mut self) {
        self.frame = self.frame.next();
        debug!("UI: frame {:?}", self.frame);
    }

    fn previous_frame(&mut self) {
        self.frame = self.frame.previous();
        debug!("UI: frame {:?}", self.frame);
    }

    fn set_display_power(&mut self, on: bool) {
        self.display_on = on;
        self.renderer.set_power(on);
        info!("UI: display {}", if on { "on" } else { "off" });
    }
}
