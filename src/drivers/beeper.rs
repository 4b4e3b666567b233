//! Piezo beeper sequencer.
//!
//! A request for `n` beeps plays `n` × (tone `BEEP_ON_MS`, silence
//! `BEEP_OFF_MS`).  The sequencer is advanced from the loop's low-priority
//! phase, so tone lengths stretch slightly when the UI is busy.  While a
//! sequence plays, further requests are rejected with
//! [`AlertError::Busy`].

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::{AlertError, AlertPort};
use crate::scheduler::elapsed_ms;

const BEEP_ON_MS: u32 = 100;
const BEEP_OFF_MS: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BeepState {
    Idle,
    Tone { remaining: u8, since_ms: u32 },
    Gap { remaining: u8, since_ms: u32 },
}

pub struct Beeper<P> {
    pin: P,
    state: BeepState,
}

impl<P: OutputPin> Beeper<P> {
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("Beeper: could not drive pin low");
        }
        Self {
            pin,
            state: BeepState::Idle,
        }
    }

    fn drive(&mut self, on: bool) {
        let result = if on { self.pin.set_high() } else { self.pin.set_low() };
        if result.is_err() {
            warn!("Beeper: pin write failed");
        }
    }
}

impl<P: OutputPin> AlertPort for Beeper<P> {
    fn update(&mut self, now_ms: u32) {
        match self.state {
            BeepState::Idle => {}
            BeepState::Tone { remaining, since_ms } => {
                if elapsed_ms(now_ms, since_ms) >= BEEP_ON_MS {
                    self.drive(false);
                    self.state = BeepState::Gap {
                        remaining: remaining - 1,
                        since_ms: now_ms,
                    };
                }
            }
            BeepState::Gap { remaining, since_ms } => {
                if elapsed_ms(now_ms, since_ms) >= BEEP_OFF_MS {
                    if remaining == 0 {
                        self.state = BeepState::Idle;
                        debug!("Beeper: sequence done");
                    } else {
                        self.drive(true);
                        self.state = BeepState::Tone {
                            remaining,
                            since_ms: now_ms,
                        };
                    }
                }
            }
        }
    }

    fn request(&mut self, count: u8, now_ms: u32) -> Result<(), AlertError> {
        if self.is_busy() {
            return Err(AlertError::Busy);
        }
        if count == 0 {
            return Err(AlertError::InvalidCount);
        }
        debug!("Beeper: {} beeps", count);
        self.drive(true);
        self.state = BeepState::Tone {
            remaining: count,
            since_ms: now_ms,
        };
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.state != BeepState::Idle
    }
}
