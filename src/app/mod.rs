//! Application core: the main loop's domain logic, zero direct I/O.
//!
//! Metering reads, button dispatch, HTTP answers, and the scheduled duties
//! of the meter live here.  All interaction with hardware and the network
//! happens through **port traits** defined in [`ports`], keeping this layer
//! fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
