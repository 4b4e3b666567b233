//! One-shot hardware peripheral initialization.
//!
//! Configures GPIO directions, the battery ADC channel, and the GPIO ISR
//! service using raw ESP-IDF sys calls.  Called from `main()` before the
//! loop starts.  Every ISR registered here is bound to a `'static` context
//! object through the handler's argument pointer, so there is no global
//! mutable state behind the interrupts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::drivers::button::ButtonIsr;
use crate::metering::{EdgeInput, PulseCounter};
#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    IsrAddFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrAddFailed(rc) => write!(f, "GPIO ISR handler add failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("peripheral init")
    }
}

// ── Time base ─────────────────────────────────────────────────

/// Milliseconds since boot, truncated to `u32` (wraps after ~49.7 days).
/// Safe in ISR context.
#[cfg(target_os = "espidf")]
#[inline]
pub fn uptime_ms() -> u32 {
    // SAFETY: esp_timer_get_time is an RTC counter read; ISR-safe.
    (unsafe { esp_timer_get_time() } / 1_000) as u32
}

#[cfg(not(target_os = "espidf"))]
pub fn uptime_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u32
}

// ── Board outputs ─────────────────────────────────────────────

/// Drive the deep-sleep wake line high and configure the battery ADC.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the loop; single-threaded.
    unsafe {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pins::DEEP_SLEEP_GPIO,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = gpio_config(&cfg);
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        gpio_set_level(pins::DEEP_SLEEP_GPIO, 1);

        init_adc()?;
    }
    info!("hw_init: peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(ADC1_HANDLE, pins::BATTERY_ADC_CHANNEL, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 CH{} configured (battery)", pins::BATTERY_ADC_CHANNEL);
    Ok(())
}

/// Raw 12-bit reading, `None` on driver error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: ADC1_HANDLE is written once during init_adc() before this is
    // called; main-loop access only.
    let ret = unsafe { adc_oneshot_read(ADC1_HANDLE, channel, &mut raw) };
    (ret == ESP_OK as i32).then_some(raw.max(0) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    None
}

// ── GPIO ISR service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pulse_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static PulseCounter` registered in
    // `PulseInput::attach`; it outlives the handler.
    let counter = unsafe { &*(arg as *const PulseCounter) };
    counter.on_edge(uptime_ms());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static ButtonIsr` registered in
    // `attach_button_isr`.
    let isr = unsafe { &*(arg as *const ButtonIsr) };
    isr.record(uptime_ms());
}

/// Install the per-pin ISR service.  Idempotent.
#[cfg(target_os = "espidf")]
fn ensure_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
        return Err(HwInitError::IsrInstallFailed(ret));
    }
    Ok(())
}

/// Configure `gpio` as an interrupting input and bind `handler` to `arg`.
#[cfg(target_os = "espidf")]
unsafe fn attach_isr(
    gpio: i32,
    pull_up: bool,
    intr: gpio_int_type_t,
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
    arg: *mut core::ffi::c_void,
) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: intr,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    ensure_isr_service()?;
    let ret = unsafe { gpio_isr_handler_add(gpio, Some(handler), arg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::IsrAddFailed(ret));
    }
    unsafe { gpio_intr_enable(gpio) };
    Ok(())
}

/// Transducer input line: pulled up, interrupt on the rising edge.
pub struct PulseInput {
    gpio: i32,
    #[cfg(not(target_os = "espidf"))]
    counter: Option<&'static PulseCounter>,
}

impl PulseInput {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            #[cfg(not(target_os = "espidf"))]
            counter: None,
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Simulate a rising edge at `now_ms` (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn fire(&self, now_ms: u32) {
        if let Some(counter) = self.counter {
            counter.on_edge(now_ms);
        }
    }
}

impl EdgeInput for PulseInput {
    type Error = HwInitError;

    #[cfg(target_os = "espidf")]
    fn attach(&mut self, counter: &'static PulseCounter) -> Result<(), HwInitError> {
        let arg = counter as *const PulseCounter as *mut core::ffi::c_void;
        // SAFETY: `counter` is 'static, so the pointer stays valid for the
        // lifetime of the handler.
        unsafe {
            attach_isr(
                self.gpio,
                true,
                gpio_int_type_t_GPIO_INTR_POSEDGE,
                pulse_gpio_isr,
                arg,
            )?;
        }
        info!("hw_init: pulse input on GPIO{} (rising edge)", self.gpio);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn attach(&mut self, counter: &'static PulseCounter) -> Result<(), HwInitError> {
        self.counter = Some(counter);
        log::info!("hw_init(sim): pulse input on GPIO{}", self.gpio);
        Ok(())
    }
}

/// Bind a button's edge interrupt to its [`ButtonIsr`].
#[cfg(target_os = "espidf")]
pub fn attach_button_isr(gpio: i32, active_low: bool, isr: &'static ButtonIsr) -> Result<(), HwInitError> {
    let intr = if active_low {
        gpio_int_type_t_GPIO_INTR_NEGEDGE
    } else {
        gpio_int_type_t_GPIO_INTR_POSEDGE
    };
    let arg = isr as *const ButtonIsr as *mut core::ffi::c_void;
    // SAFETY: `isr` is 'static.
    unsafe { attach_isr(gpio, active_low, intr, button_gpio_isr, arg)? };
    info!("hw_init: button on GPIO{} ({})", gpio, if active_low { "active-low" } else { "active-high" });
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn attach_button_isr(gpio: i32, _active_low: bool, _isr: &'static ButtonIsr) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): button on GPIO{}", gpio);
    Ok(())
}
