//! ISR-debounced button driver with short, long, and double press detection.
//!
//! ## Hardware
//!
//! Two momentary switches: the menu button is active-low with the internal
//! pull-up, the enter button active-high with an external pull-down.  The
//! GPIO interrupt on the pressing edge records a timestamp into the button's
//! [`ButtonIsr`]; [`ButtonDriver::tick`] (called once per main-loop
//! iteration) runs the debounce + gesture state machine, reading the pin
//! level through `embedded-hal`.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                                  | Event         |
//! |--------------|--------------------------------------------|---------------|
//! | Short press  | Release < 1 s, no second press within 250 ms | `ShortPress`  |
//! | Long press   | Hold >= 1 s                                | `LongPress`   |
//! | Double press | Second press within 250 ms of the release  | `DoublePress` |

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::digital::InputPin;

use crate::app::ports::{ButtonId, InputPort};
use crate::scheduler::elapsed_ms;

const DEBOUNCE_MS: u32 = 20;
const LONG_PRESS_MS: u32 = 1_000;
const DOUBLE_PRESS_WINDOW_MS: u32 = 250;

/// Edge timestamp shared between a button's ISR and its driver.
///
/// Lives in a `static`; its address is the ISR's context argument.
pub struct ButtonIsr {
    timestamp: AtomicU32,
}

impl ButtonIsr {
    pub const fn new() -> Self {
        Self {
            timestamp: AtomicU32::new(0),
        }
    }

    /// Interrupt context.  Lock-free store of the edge time.
    #[inline]
    pub fn record(&self, now_ms: u32) {
        self.timestamp.store(now_ms, Ordering::Release);
    }

    fn last(&self) -> u32 {
        self.timestamp.load(Ordering::Acquire)
    }
}

impl Default for ButtonIsr {
    fn default() -> Self {
        Self::new()
    }
}

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
    DoublePress,
}

/// Which pin level means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    Low,
    High,
}

/// Internal state machine for gesture detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    WaitSecondPress { first_release_ms: u32 },
    /// A gesture was reported; ignore everything until release.
    WaitRelease,
}

pub struct ButtonDriver<P> {
    pin: P,
    active: ActiveLevel,
    isr: &'static ButtonIsr,
    state: GestureState,
    last_isr_ms: u32,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, active: ActiveLevel, isr: &'static ButtonIsr) -> Self {
        Self {
            pin,
            active,
            isr,
            state: GestureState::Idle,
            last_isr_ms: isr.last(),
        }
    }

    /// Call once per main-loop iteration.
    /// `now_ms` is the current monotonic time in milliseconds.
    /// Returns a classified gesture event, if any.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        let isr_ms = self.isr.last();
        let new_press = isr_ms != self.last_isr_ms && isr_ms != 0;
        if new_press {
            self.last_isr_ms = isr_ms;
        }

        match self.state {
            GestureState::Idle => {
                if new_press {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if elapsed_ms(now_ms, since_ms) >= DEBOUNCE_MS {
                    self.state = if self.is_pressed() {
                        GestureState::Pressed { since_ms }
                    } else {
                        GestureState::Idle
                    };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if elapsed_ms(now_ms, since_ms) >= LONG_PRESS_MS {
                    self.state = GestureState::WaitRelease;
                    return Some(ButtonEvent::LongPress);
                }
                if !self.is_pressed() {
                    self.state = GestureState::WaitSecondPress {
                        first_release_ms: now_ms,
                    };
                }
                None
            }

            GestureState::WaitSecondPress { first_release_ms } => {
                let gap = elapsed_ms(now_ms, first_release_ms);

                if new_press && gap <= DOUBLE_PRESS_WINDOW_MS {
                    self.state = GestureState::WaitRelease;
                    return Some(ButtonEvent::DoublePress);
                }

                if gap > DOUBLE_PRESS_WINDOW_MS {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }

                None
            }

            GestureState::WaitRelease => {
                if !self.is_pressed() {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    /// A pin read error counts as "not pressed".
    fn is_pressed(&mut self) -> bool {
        let level = match self.active {
            ActiveLevel::Low => self.pin.is_low(),
            ActiveLevel::High => self.pin.is_high(),
        };
        level.unwrap_or(false)
    }
}

/// Both front-panel buttons behind the [`InputPort`].
pub struct FrontPanel<M, E> {
    pub menu: ButtonDriver<M>,
    pub enter: ButtonDriver<E>,
}

impl<M: InputPin, E: InputPin> InputPort for FrontPanel<M, E> {
    fn poll(&mut self, button: ButtonId, now_ms: u32) -> Option<ButtonEvent> {
        match button {
            ButtonId::Menu => self.menu.tick(now_ms),
            ButtonId::Enter => self.enter.tick(now_ms),
        }
    }
}
