//! Debounced "pulses are arriving" indicator.
//!
//! Drives the pulse icon on the display.  Two states with asymmetric
//! guards: a burst of more than `min_pulses_for_status` pulses lights the
//! icon at once, but it only clears after `activity_quiet_ms` without any
//! further qualifying growth.  Isolated noise pulses never light it.
//!
//! | From   | Guard                         | To     |
//! |--------|-------------------------------|--------|
//! | any    | `growth_exceeds_threshold`    | Active |
//! | Active | `quiet_interval_elapsed`      | Idle   |

use crate::config::MeterConfig;
use crate::scheduler::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Idle,
    Active,
}

/// Hysteresis state machine over the cumulative pulse count.
#[derive(Debug, Clone)]
pub struct ActivityStatus {
    state: ActivityState,
    /// Pulse count at the last qualifying growth.
    baseline_count: u32,
    /// Tick of the last qualifying growth.
    last_transition_ms: u32,
    min_pulses: u32,
    quiet_ms: u32,
}

impl ActivityStatus {
    pub fn new(now_ms: u32, config: &MeterConfig) -> Self {
        Self {
            state: ActivityState::Idle,
            baseline_count: 0,
            last_transition_ms: now_ms,
            min_pulses: config.min_pulses_for_status,
            quiet_ms: config.activity_quiet_ms,
        }
    }

    /// Feed the current pulse count.  Returns the new state if it changed.
    pub fn update(&mut self, count: u32, now_ms: u32) -> Option<ActivityState> {
        let previous = self.state;

        if self.growth_exceeds_threshold(count) {
            self.baseline_count = count;
            self.last_transition_ms = now_ms;
            self.state = ActivityState::Active;
        } else if self.quiet_interval_elapsed(now_ms) {
            self.state = ActivityState::Idle;
        }

        (self.state != previous).then_some(self.state)
    }

    /// Forget the baseline after the pulse counter was cleared.
    pub fn reset_baseline(&mut self) {
        self.baseline_count = 0;
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivityState::Active
    }

    pub fn baseline_count(&self) -> u32 {
        self.baseline_count
    }

    fn growth_exceeds_threshold(&self, count: u32) -> bool {
        count.wrapping_sub(self.baseline_count) > self.min_pulses
    }

    fn quiet_interval_elapsed(&self, now_ms: u32) -> bool {
        elapsed_ms(now_ms, self.last_transition_ms) >= self.quiet_ms
    }
}
