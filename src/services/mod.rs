//! Shared state and desktop network services.
//!
//! - [`shared`]: the single registry and printer status handles, wrapped in `Arc`
//! - [`api`]: JSON response types for the read-only HTTP endpoints
//! - `web` feature: Axum control server (WebSocket plus HTTP)
//! - `mqtt` feature: `rumqttc` printer client
//!
//! # Shared State Pattern
//!
//! All services share one registry and one status instance:
//!
//! ```ignore
//! use std::sync::Arc;
//! use top_ams::services::{SharedPrinterStatus, SharedRegistry};
//!
//! let registry = Arc::new(SharedRegistry::new(registry));
//! let status = Arc::new(SharedPrinterStatus::new());
//!
//! let (printer, events) = PrinterClient::new(printer_config, Arc::clone(&status));
//! let app = Arc::new(AppState::new(Arc::clone(&registry), status, device, printer));
//! ```

pub mod api;
pub mod shared;

#[cfg(feature = "web")]
pub mod web;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use api::*;
pub use shared::*;

#[cfg(feature = "web")]
pub use web::*;

#[cfg(feature = "mqtt")]
pub use mqtt::*;
