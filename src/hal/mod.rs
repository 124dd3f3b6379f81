//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `file`: Directory-backed storage and device control for desktop runs (requires `std`)
//! - `esp32`: ESP32-C3 NVS, Wi-Fi, socket server and printer MQTT (requires `esp32` feature)

pub mod mock;

#[cfg(feature = "std")]
pub mod file;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;

#[cfg(feature = "std")]
pub use file::{FileDevice, FileStore};

#[cfg(feature = "esp32")]
pub use esp32::*;
