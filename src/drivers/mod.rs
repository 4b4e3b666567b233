//! Button and beeper drivers, hardware initialisation, and the watchdog.

pub mod beeper;
pub mod button;
pub mod hw_init;
pub mod watchdog;
