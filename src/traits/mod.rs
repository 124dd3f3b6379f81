//! Trait definitions for storage, device control and the printer channel.
//!
//! This module defines the seams that let top-ams:
//! - Persist state on different backends (NVS, files, in-memory mock)
//! - Run device side effects on hardware or against a recording mock
//! - Publish printer commands over whichever MQTT client is available
//!
//! # Submodules
//!
//! - `storage`: [`KvStore`] blob store used by the registry and settings
//! - `device`: [`DeviceControl`] for reboot, Wi-Fi reconnect, MAC, settings
//! - `network`: [`PrinterLink`] outbound printer command channel

pub mod device;
pub mod network;
pub mod storage;

pub use device::*;
pub use network::*;
pub use storage::*;
