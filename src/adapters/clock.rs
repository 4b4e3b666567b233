//! Clock adapters.
//!
//! - [`SystemClock`]: the monotonic millisecond tick every loop timer and
//!   the frame pacer run on.
//! - [`SntpClock`]: wall-clock time for log records, synchronised over
//!   SNTP once the station link is up.
//!
//! On `target_os = "espidf"` these wrap `esp_timer_get_time()` and
//! `esp_idf_svc::sntp`; elsewhere `std::time` stands in for host tests.

use log::info;

use crate::app::ports::ClockPort;
use crate::drivers::hw_init;
use crate::render::TickSource;

/// Anything earlier than 2020-01-01 means the RTC was never set.
pub const EPOCH_2020: u32 = 1_577_836_800;

// ───────────────────────────────────────────────────────────────
// Monotonic tick
// ───────────────────────────────────────────────────────────────

/// Milliseconds since boot on a wrapping `u32`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn now_ms(&self) -> u32 {
        hw_init::uptime_ms()
    }
}

impl TickSource for SystemClock {
    fn now_ms(&self) -> u32 {
        SystemClock::now_ms(self)
    }
}

// ───────────────────────────────────────────────────────────────
// Wall clock
// ───────────────────────────────────────────────────────────────

pub struct SntpClock {
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
    #[cfg(not(target_os = "espidf"))]
    started: bool,
    synced: bool,
}

impl Default for SntpClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SntpClock {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(not(target_os = "espidf"))]
            started: false,
            synced: false,
        }
    }

    /// Raw system time in Unix seconds.
    #[cfg(target_os = "espidf")]
    fn system_epoch(&self) -> Option<u32> {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        // SAFETY: gettimeofday writes into the provided struct only.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        u32::try_from(tv.tv_sec).ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn system_epoch(&self) -> Option<u32> {
        if !self.started {
            return None;
        }
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        u32::try_from(secs).ok()
    }
}

impl ClockPort for SntpClock {
    #[cfg(target_os = "espidf")]
    fn begin(&mut self) {
        if self.sntp.is_some() {
            return;
        }
        match esp_idf_svc::sntp::EspSntp::new_default() {
            Ok(sntp) => {
                self.sntp = Some(sntp);
                info!("Clock: SNTP started");
            }
            Err(e) => log::warn!("Clock: SNTP start failed ({})", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn begin(&mut self) {
        self.started = true;
        info!("Clock(sim): sync started");
    }

    fn update(&mut self) {
        let synced = self.epoch_secs().is_some();
        if synced && !self.synced {
            info!("Clock: synchronised");
        }
        self.synced = synced;
    }

    fn epoch_secs(&self) -> Option<u32> {
        self.system_epoch().filter(|secs| *secs >= EPOCH_2020)
    }
}
