//! System configuration parameters
//!
//! Every tunable of the meter is fixed at build time.  The named constants
//! below are the single source of truth; [`MeterConfig`] groups them so the
//! metering and scheduling code can be exercised with other values in tests.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// --- Transducer ---

/// Energy quantum of the transducer: pulses emitted per kilowatt-hour.
pub const PULSES_PER_KILOWATT_HOUR: u32 = 10_000;
/// Highest load the meter reports.  Faster pulses are treated as bounce.
pub const MAXIMUM_WATT_SUPPORTED: u32 = 15_000;
/// Lowest load the meter reports.  Slower pulses read as "no load".
pub const MINIMUM_WATT_SUPPORTED: u32 = 1;

// --- Activity indicator ---

/// Pulse growth that must be exceeded before the activity icon lights.
pub const MINIMUM_PULSES_FOR_STATUS: u32 = 1;
/// Quiet time after the last qualifying growth before the icon clears.
pub const ACTIVITY_QUIET_INTERVAL_MS: u32 = 2_000;

// --- Scheduling ---

/// Interval between persisted log records.
pub const LOG_INTERVAL_MS: u32 = 10_000;
/// How long the "log written" icon stays visible.
pub const LOG_INDICATOR_MS: u32 = 500;
/// Interval between environment sensor samples.
pub const SAMPLE_INTERVAL_MS: u32 = 2_000;
/// Back-off between WiFi station reconnect attempts.
pub const RECONNECT_INTERVAL_MS: u32 = 5_000;
/// Display refresh rate.
pub const TARGET_FPS: u32 = 10;

/// `seconds/hour × W/kW × ms/s`, the numerator of the interval → watts
/// conversion when the interval is expressed in milliseconds.
pub const WATT_MS_PER_KILOWATT_HOUR: u64 = 3_600 * 1_000 * 1_000;

/// Metering and scheduling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterConfig {
    // --- Transducer ---
    pub pulses_per_kwh: u32,
    pub max_watts: u32,
    pub min_watts: u32,

    // --- Activity ---
    pub min_pulses_for_status: u32,
    pub activity_quiet_ms: u32,

    // --- Timing ---
    pub log_interval_ms: u32,
    pub log_indicator_ms: u32,
    pub sample_interval_ms: u32,
    pub reconnect_interval_ms: u32,
    pub target_fps: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl MeterConfig {
    /// Build-time configuration, usable in `const` and `static` contexts.
    pub const DEFAULT: Self = Self {
        pulses_per_kwh: PULSES_PER_KILOWATT_HOUR,
        max_watts: MAXIMUM_WATT_SUPPORTED,
        min_watts: MINIMUM_WATT_SUPPORTED,

        min_pulses_for_status: MINIMUM_PULSES_FOR_STATUS,
        activity_quiet_ms: ACTIVITY_QUIET_INTERVAL_MS,

        log_interval_ms: LOG_INTERVAL_MS,
        log_indicator_ms: LOG_INDICATOR_MS,
        sample_interval_ms: SAMPLE_INTERVAL_MS,
        reconnect_interval_ms: RECONNECT_INTERVAL_MS,
        target_fps: TARGET_FPS,
    };

    /// Shortest pulse interval that still counts as a real load, i.e. the
    /// interval produced by `max_watts`, rounded up so that no accepted
    /// interval reads above `max_watts`.  Inclusive bound.
    pub const fn min_valid_interval_ms(&self) -> u32 {
        interval_for_watts(self.pulses_per_kwh, self.max_watts, Rounding::Up)
    }

    /// Interval produced by `min_watts`, rounded down.  Exclusive bound: an
    /// interval this long or longer reads as zero power.
    pub const fn max_valid_interval_ms(&self) -> u32 {
        interval_for_watts(self.pulses_per_kwh, self.min_watts, Rounding::Down)
    }

    /// Frame period of the display at `target_fps`.
    pub const fn frame_interval_ms(&self) -> u32 {
        if self.target_fps == 0 {
            return 0;
        }
        1_000 / self.target_fps
    }

    /// Reject configurations the meter cannot operate with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.pulses_per_kwh == 0 {
            return Err(Error::Config("pulses_per_kwh must be non-zero"));
        }
        if self.min_watts == 0 || self.min_watts >= self.max_watts {
            return Err(Error::Config("min_watts must be non-zero and below max_watts"));
        }
        if self.min_valid_interval_ms() >= self.max_valid_interval_ms() {
            return Err(Error::Config("wattage range leaves no whole-millisecond pulse interval"));
        }
        if self.target_fps == 0 || self.target_fps > 1_000 {
            return Err(Error::Config("target_fps must be 1 to 1000"));
        }
        if self.log_indicator_ms >= self.log_interval_ms {
            return Err(Error::Config("log indicator must expire before the next log record"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Rounding {
    Up,
    Down,
}

/// Pulse interval in milliseconds for a steady load of `watts`.
const fn interval_for_watts(pulses_per_kwh: u32, watts: u32, rounding: Rounding) -> u32 {
    let denominator = pulses_per_kwh as u64 * watts as u64;
    if denominator == 0 {
        return u32::MAX;
    }
    let interval = match rounding {
        Rounding::Up => WATT_MS_PER_KILOWATT_HOUR.div_ceil(denominator),
        Rounding::Down => WATT_MS_PER_KILOWATT_HOUR / denominator,
    };
    if interval > u32::MAX as u64 {
        u32::MAX
    } else {
        interval as u32
    }
}
