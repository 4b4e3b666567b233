//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the main loop stops iterating.  The loop is
//! cooperative, so a stuck collaborator (a blocking socket, a wedged I²C
//! transfer) would otherwise freeze metering reads and the UI forever.
//!
//! The main loop must call [`Watchdog::feed`] once per iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Loop stall that triggers a reset.
pub const WATCHDOG_TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    feeds: u32,
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the calling task.
    #[cfg(target_os = "espidf")]
    pub fn new(timeout_ms: u32) -> Self {
        // SAFETY: TWDT calls from the main task during boot.
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK as i32 {
                log::warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
            }

            let ret = esp_task_wdt_add(core::ptr::null_mut());
            let subscribed = ret == ESP_OK as i32;
            if subscribed {
                info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
            }

            Self { subscribed, feeds: 0 }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(timeout_ms: u32) -> Self {
        info!("Watchdog(sim): {} ms, no-op", timeout_ms);
        Self { feeds: 0 }
    }

    /// Feed the watchdog.
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the calling task's TWDT entry.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// Number of feeds since boot (wrapping).
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}
