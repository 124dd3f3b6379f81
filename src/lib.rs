//! # top-ams
//!
//! Firmware core for a multi-spool filament feeder that sits next to a
//! networked 3D printer.
//!
//! ## Features
//!
//! - **Filament registry**: persistent id/motor/metadata records with unique ids and motors
//! - **Control protocol**: one JSON request per message, one JSON response back
//! - **Printer telemetry**: tracked fields extracted from partial status reports
//! - **Printer commands**: typed commands encoded to the printer's JSON wire format
//! - **Hardware abstraction**: key-value storage, device control and printer link traits
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Storage, device and printer-link abstractions
//! - `registry` - The filament registry and its snapshot format
//! - `dispatch` - Control-protocol dispatcher
//! - `telemetry` - Status report extraction and merging
//! - `commands` - Outbound printer commands
//! - `hal` - Concrete implementations (mock and file for desktop, esp32 for hardware)
//! - `services` - Shared state and desktop network services (requires `std`)
//!
//! ## Example
//!
//! ```rust
//! use core::cell::RefCell;
//! use top_ams::{
//!     Dispatcher, FilamentRegistry,
//!     hal::{MockDevice, MockStore},
//!     traits::NoPrinter,
//! };
//!
//! // Registry over mock storage
//! let mut registry = FilamentRegistry::new(MockStore::new(), "filaments");
//! registry.init();
//! let registry = RefCell::new(registry);
//!
//! let dispatcher = Dispatcher::new(&registry, MockDevice::new(), NoPrinter);
//! let out = dispatcher.dispatch(br#"{"type":"filament","action":"add","motor_id":2,"metadata":"{\"color\":\"red\"}"}"#);
//! assert_eq!(out.response, r#"{"id":1,"success":true}"#);
//!
//! let out = dispatcher.dispatch(br#"{"type":"filament","action":"count"}"#);
//! assert_eq!(out.response, r#"{"count":1,"success":true}"#);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Outbound printer commands and their wire encoding.
pub mod commands;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Control-protocol dispatcher.
pub mod dispatch;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Filament metadata text and field lookup.
pub mod metadata;
/// Persistent filament registry.
pub mod registry;
/// Device settings reachable through the control protocol.
pub mod settings;
/// Printer status report extraction.
pub mod telemetry;
/// Core traits for storage, device control and the printer link.
pub mod traits;

/// Shared state and network services (requires `std`).
#[cfg(feature = "std")]
pub mod services;

// Re-exports for convenience
pub use commands::{BuzzerMode, LightNode, PrinterCommand, SpeedLevel};
pub use dispatch::{DispatchOutcome, Dispatcher, PostAction};
pub use metadata::Metadata;
pub use registry::{
    FilamentRecord, FilamentRegistry, RegistryAccess, RegistryError, SnapshotError,
};
pub use settings::SettingKey;
pub use telemetry::{PrinterStatus, StatusUpdate};
pub use traits::{DeviceControl, DeviceError, KvStore, LinkError, NoPrinter, PrinterLink};

// Config re-exports
pub use config::{Config, DeviceConfig, PrinterConfig, RegistryConfig, WebConfig, WifiConfig};
