//! GPIO / peripheral pin assignments for the power meter board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Metering transducer
// ---------------------------------------------------------------------------

/// S0 pulse output of the energy meter (open collector, internal pull-up).
/// Interrupt on rising edge.
pub const PULSE_INPUT_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// Menu button, active-low, internal pull-up.
pub const MENU_BUTTON_GPIO: i32 = 14;
/// Enter button, active-high with external pull-down.
pub const ENTER_BUTTON_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Peripherals
// ---------------------------------------------------------------------------

/// Piezo beeper, driven high to sound.
pub const BEEPER_GPIO: i32 = 13;
/// DHT11 single-wire data line.
pub const DHT_GPIO: i32 = 0;
/// Held high so the RTC can pull it low to wake from deep sleep.
pub const DEEP_SLEEP_GPIO: i32 = 16;
/// Battery voltage divider (ADC1 channel 0).
pub const BATTERY_ADC_GPIO: i32 = 1;
/// ADC1 channel wired to [`BATTERY_ADC_GPIO`].
pub const BATTERY_ADC_CHANNEL: u32 = 0;

// ---------------------------------------------------------------------------
// I²C bus (SSD1306 128×32 OLED at 0x3C)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 4;
pub const I2C_SCL_GPIO: i32 = 5;
pub const OLED_I2C_ADDR: u8 = 0x3C;
