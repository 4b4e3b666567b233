//! Battery charge estimator.
//!
//! Samples the battery divider once a second, keeps a short moving average
//! of the cell voltage, and maps it linearly onto 0–100 % between
//! [`EMPTY_MV`] and [`FULL_MV`].
//!
//! The ADC read is injected so the estimator runs against the real ADC on
//! the device and a scripted source in tests.

use heapless::HistoryBuffer;
use log::{debug, warn};

use crate::app::ports::BatteryPort;
use crate::scheduler::elapsed_ms;

/// Divider output at ADC full scale, in millivolts of cell voltage.
pub const FULL_SCALE_MV: u32 = 4_430;
/// 12-bit ADC.
pub const ADC_MAX: u32 = 4_095;
pub const EMPTY_MV: u32 = 3_300;
pub const FULL_MV: u32 = 4_200;

const SAMPLE_INTERVAL_MS: u32 = 1_000;
const WINDOW: usize = 8;

pub fn raw_to_millivolts(raw: u16) -> u32 {
    raw.min(ADC_MAX as u16) as u32 * FULL_SCALE_MV / ADC_MAX
}

pub fn millivolts_to_percent(mv: u32) -> u8 {
    let clamped = mv.clamp(EMPTY_MV, FULL_MV);
    ((clamped - EMPTY_MV) * 100 / (FULL_MV - EMPTY_MV)) as u8
}

pub struct BatteryGauge<R> {
    read_raw: R,
    samples: HistoryBuffer<u32, WINDOW>,
    last_sample_ms: Option<u32>,
    failures: u32,
}

impl<R: FnMut() -> Option<u16>> BatteryGauge<R> {
    pub fn new(read_raw: R) -> Self {
        Self {
            read_raw,
            samples: HistoryBuffer::new(),
            last_sample_ms: None,
            failures: 0,
        }
    }

    /// Averaged cell voltage, `None` before the first good sample.
    pub fn millivolts(&self) -> Option<u32> {
        let n = self.samples.len() as u32;
        (n > 0).then(|| self.samples.iter().sum::<u32>() / n)
    }

    fn sample_due(&self, now_ms: u32) -> bool {
        self.last_sample_ms
            .is_none_or(|last| elapsed_ms(now_ms, last) >= SAMPLE_INTERVAL_MS)
    }
}

impl<R: FnMut() -> Option<u16>> BatteryPort for BatteryGauge<R> {
    fn update(&mut self, now_ms: u32) {
        if !self.sample_due(now_ms) {
            return;
        }
        self.last_sample_ms = Some(now_ms);
        match (self.read_raw)() {
            Some(raw) => {
                let mv = raw_to_millivolts(raw);
                self.samples.write(mv);
                debug!("Battery: raw={} {}mV", raw, mv);
            }
            None => {
                self.failures = self.failures.wrapping_add(1);
                if self.failures.is_power_of_two() {
                    warn!("Battery: ADC read failed ({} times)", self.failures);
                }
            }
        }
    }

    fn percent(&self) -> Option<u8> {
        self.millivolts().map(millivolts_to_percent)
    }
}
