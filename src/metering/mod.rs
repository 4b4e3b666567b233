//! Pulse-based power metering.
//!
//! The energy meter's S0 output emits one pulse per fixed energy quantum
//! (1/10 000 kWh by default).  The GPIO interrupt calls
//! [`PulseCounter::on_edge`], which counts the pulse and derives the
//! instantaneous load from the interval since the previous one:
//!
//! ```text
//!   watts = 3 600 000 000 / (interval_ms × pulses_per_kwh)
//! ```
//!
//! Intervals outside `[min_valid_interval_ms, max_valid_interval_ms)` read
//! as 0 W (contact bounce on one side, no load on the other) but the pulse
//! is still counted, so the cumulative count stays faithful to the meter.
//!
//! ## Sharing with the ISR
//!
//! [`PulseCounter`] is the only state touched from interrupt context.  It
//! lives in a `static`, its fields sit behind a `critical_section::Mutex`,
//! and every access is a copy in or out of a `Cell` with interrupts masked.
//! The section is never held across I/O.  [`PulseMeter`] is the
//! main-loop handle: it reads snapshots, clears, and runs the activity
//! debounce, which never leaves the main loop.

pub mod activity;

use core::cell::Cell;

use critical_section::Mutex;
use log::info;

use crate::config::{MeterConfig, WATT_MS_PER_KILOWATT_HOUR};
use activity::{ActivityState, ActivityStatus};

// ═══════════════════════════════════════════════════════════════
//  Interval → watts
// ═══════════════════════════════════════════════════════════════

/// Valid pulse-interval window plus the transducer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseWindow {
    /// Inclusive lower bound (fastest valid pulse train).
    pub min_interval_ms: u32,
    /// Exclusive upper bound (slowest valid pulse train).
    pub max_interval_ms: u32,
    pub pulses_per_kwh: u32,
}

impl PulseWindow {
    pub const fn from_config(config: &MeterConfig) -> Self {
        Self {
            min_interval_ms: config.min_valid_interval_ms(),
            max_interval_ms: config.max_valid_interval_ms(),
            pulses_per_kwh: config.pulses_per_kwh,
        }
    }

    /// Whether `interval_ms` lies in `[min, max)`.
    pub const fn accepts(&self, interval_ms: u32) -> bool {
        interval_ms >= self.min_interval_ms && interval_ms < self.max_interval_ms
    }

    /// Instantaneous load for a pulse `interval_ms` after the previous one,
    /// rounded to the nearest watt.  Out-of-window intervals yield 0.
    ///
    /// Integer-only and branch-bounded; safe to call from the ISR.
    pub const fn watts(&self, interval_ms: u32) -> u32 {
        if !self.accepts(interval_ms) {
            return 0;
        }
        let denominator = interval_ms as u64 * self.pulses_per_kwh as u64;
        if denominator == 0 {
            return 0;
        }
        let watts = (WATT_MS_PER_KILOWATT_HOUR + denominator / 2) / denominator;
        if watts > u32::MAX as u64 {
            0
        } else {
            watts as u32
        }
    }
}

/// Instantaneous load for a pulse interval under `config`.
pub const fn power_for_interval(interval_ms: u32, config: &MeterConfig) -> u32 {
    PulseWindow::from_config(config).watts(interval_ms)
}

// ═══════════════════════════════════════════════════════════════
//  ISR-shared counter
// ═══════════════════════════════════════════════════════════════

/// Snapshot of the ISR-owned metering fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeteringState {
    /// Pulses since boot or the last clear.
    pub pulse_count: u32,
    /// Tick of the most recent edge.
    pub last_edge_ms: u32,
    /// Load derived from the most recent interval.
    pub instant_power_w: u32,
}

/// Metering context shared between the edge interrupt and the main loop.
///
/// Meant to be placed in a `static` and registered with the GPIO ISR as
/// its context pointer.
pub struct PulseCounter {
    state: Mutex<Cell<MeteringState>>,
    window: PulseWindow,
}

impl PulseCounter {
    pub const fn new(config: &MeterConfig) -> Self {
        Self {
            state: Mutex::new(Cell::new(MeteringState {
                pulse_count: 0,
                last_edge_ms: 0,
                instant_power_w: 0,
            })),
            window: PulseWindow::from_config(config),
        }
    }

    /// Rising-edge handler.  Interrupt context only; `now_ms` is the
    /// millisecond tick read by the ISR trampoline.
    ///
    /// Must not allocate or log.  The count wraps and any arithmetic
    /// anomaly resolves to 0 W.
    pub fn on_edge(&self, now_ms: u32) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut s = cell.get();
            let interval = now_ms.wrapping_sub(s.last_edge_ms);
            s.instant_power_w = self.window.watts(interval);
            s.last_edge_ms = now_ms;
            s.pulse_count = s.pulse_count.wrapping_add(1);
            cell.set(s);
        });
    }

    /// Consistent copy of all three fields.
    pub fn snapshot(&self) -> MeteringState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    pub fn count(&self) -> u32 {
        self.snapshot().pulse_count
    }

    pub fn instant_power(&self) -> u32 {
        self.snapshot().instant_power_w
    }

    pub fn window(&self) -> PulseWindow {
        self.window
    }

    /// Zero the count and the power reading.  The last-edge tick is kept so
    /// the next interval is still measured from a real edge.
    fn clear(&self) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut s = cell.get();
            s.pulse_count = 0;
            s.instant_power_w = 0;
            cell.set(s);
        });
    }

    /// Zero every field, including the last-edge tick.
    fn reset(&self) {
        critical_section::with(|cs| self.state.borrow(cs).set(MeteringState::default()));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Edge wiring
// ═══════════════════════════════════════════════════════════════

/// The transducer input line.
///
/// Implementations configure the pin (input, pull-up, rising edge) and
/// register an interrupt handler that calls [`PulseCounter::on_edge`] with
/// `counter` as its context.
pub trait EdgeInput {
    type Error;

    fn attach(&mut self, counter: &'static PulseCounter) -> Result<(), Self::Error>;
}

// ═══════════════════════════════════════════════════════════════
//  Main-loop handle
// ═══════════════════════════════════════════════════════════════

/// Main-loop view of the meter: synchronized reads, clear, and the
/// activity debounce.
pub struct PulseMeter {
    counter: &'static PulseCounter,
    activity: ActivityStatus,
}

impl PulseMeter {
    /// Zero the counter, wire the edge interrupt, and seed the debounce
    /// with `now_ms`.  Call exactly once at boot.
    pub fn init<E: EdgeInput>(
        counter: &'static PulseCounter,
        input: &mut E,
        config: &MeterConfig,
        now_ms: u32,
    ) -> Result<Self, E::Error> {
        counter.reset();
        input.attach(counter)?;
        let window = counter.window();
        info!(
            "Meter: {} imp/kWh, valid interval {}..{} ms",
            window.pulses_per_kwh, window.min_interval_ms, window.max_interval_ms
        );
        Ok(Self {
            counter,
            activity: ActivityStatus::new(now_ms, config),
        })
    }

    pub fn count(&self) -> u32 {
        self.counter.count()
    }

    pub fn instant_power(&self) -> u32 {
        self.counter.instant_power()
    }

    pub fn snapshot(&self) -> MeteringState {
        self.counter.snapshot()
    }

    /// User-initiated reset of the cumulative count and power reading.
    /// Idempotent; the edge interrupt stays attached.
    pub fn clear(&mut self) {
        self.counter.clear();
        self.activity.reset_baseline();
        info!("Meter: cleared");
    }

    /// Run the activity debounce against the current count.  Call once per
    /// loop iteration.  Returns the new state on a transition.
    pub fn update(&mut self, now_ms: u32) -> Option<ActivityState> {
        let count = self.counter.count();
        self.activity.update(count, now_ms)
    }

    /// Debounced "pulses arriving" flag, for the display only.
    pub fn activity_status(&self) -> bool {
        self.activity.is_active()
    }
}
