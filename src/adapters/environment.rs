//! DHT11 temperature / humidity sensor.
//!
//! Single-wire protocol: the host pulls the line low for 18 ms, the sensor
//! answers with an 80 µs low / 80 µs high preamble and then 40 bits.  Each
//! bit is a ~50 µs low followed by a high pulse whose width encodes the
//! value (~27 µs → 0, ~70 µs → 1).
//!
//! Frame: `[rh_int, rh_dec, t_int, t_dec, checksum]`, checksum being the
//! low byte of the sum of the first four.  Bit 7 of `t_dec` is the sign on
//! sensors that report below 0 °C.

use log::debug;

use crate::app::ports::{EnvReading, EnvSensorPort};
use crate::error::SensorError;

/// High pulse longer than this reads as a 1 bit.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const BIT_THRESHOLD_US: u32 = 40;

pub type DhtFrame = [u8; 5];

/// Validate and convert a raw frame.
pub fn decode_frame(frame: DhtFrame) -> Result<EnvReading, SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let humidity_pct = frame[0] as f32 + frame[1] as f32 / 10.0;
    let magnitude = frame[2] as f32 + (frame[3] & 0x7F) as f32 / 10.0;
    let temperature_c = if frame[3] & 0x80 != 0 { -magnitude } else { magnitude };

    if !(0.0..=100.0).contains(&humidity_pct) || !(-20.0..=60.0).contains(&temperature_c) {
        return Err(SensorError::OutOfRange);
    }
    Ok(EnvReading {
        temperature_c,
        humidity_pct,
    })
}

/// Assemble 40 high-pulse widths into a frame.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn frame_from_pulses(widths_us: &[u32; 40]) -> DhtFrame {
    let mut frame = [0u8; 5];
    for (i, width) in widths_us.iter().enumerate() {
        if *width > BIT_THRESHOLD_US {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    frame
}

pub struct Dht11 {
    gpio: i32,
    reads: u32,
}

impl Dht11 {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, reads: 0 }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&mut self) -> Result<DhtFrame, SensorError> {
        use esp_idf_svc::sys::*;

        // Wait until the line leaves `level`; return how long that took.
        let wait_while = |level: i32, timeout_us: i64| -> Result<u32, SensorError> {
            // SAFETY: timer and GPIO level reads only.
            let start = unsafe { esp_timer_get_time() };
            loop {
                let elapsed = unsafe { esp_timer_get_time() } - start;
                if unsafe { gpio_get_level(self.gpio) } != level {
                    return Ok(elapsed as u32);
                }
                if elapsed > timeout_us {
                    return Err(SensorError::ReadFailed);
                }
            }
        };

        // SAFETY: the DHT pin is owned by this driver.
        unsafe {
            gpio_set_direction(self.gpio, gpio_mode_t_GPIO_MODE_OUTPUT);
            gpio_set_level(self.gpio, 0);
            esp_rom_delay_us(18_000);
            gpio_set_level(self.gpio, 1);
            esp_rom_delay_us(30);
            gpio_set_direction(self.gpio, gpio_mode_t_GPIO_MODE_INPUT);
            gpio_set_pull_mode(self.gpio, gpio_pull_mode_t_GPIO_PULLUP_ONLY);
        }

        // Preamble: low 80 µs, high 80 µs.
        wait_while(1, 100)?;
        wait_while(0, 100)?;
        wait_while(1, 100)?;

        let mut widths = [0u32; 40];
        for width in widths.iter_mut() {
            wait_while(0, 80)?;
            *width = wait_while(1, 100)?;
        }
        Ok(frame_from_pulses(&widths))
    }

    /// Host builds report a constant room climate.
    #[cfg(not(target_os = "espidf"))]
    fn read_frame(&mut self) -> Result<DhtFrame, SensorError> {
        let body = [45, 0, 21, 5];
        let sum = body.iter().fold(0u8, |acc: u8, b| acc.wrapping_add(*b));
        Ok([body[0], body[1], body[2], body[3], sum])
    }
}

impl EnvSensorPort for Dht11 {
    fn sample(&mut self) -> Result<EnvReading, SensorError> {
        self.reads = self.reads.wrapping_add(1);
        let reading = decode_frame(self.read_frame()?)?;
        debug!(
            "DHT11: {:.1}\u{00b0}C {:.0}% (read {})",
            reading.temperature_c, reading.humidity_pct, self.reads
        );
        Ok(reading)
    }
}
