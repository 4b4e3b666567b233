//! PowerMeter firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod logbook;
pub mod metering;
pub mod pins;
pub mod render;
pub mod scheduler;

// ESP-IDF-backed modules carry host fallbacks so the crate builds and
// tests off-target.
pub mod adapters;
pub mod drivers;
