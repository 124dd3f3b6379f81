//! Shared state handles used by every service.
//!
//! `SharedRegistry` wraps the single [`FilamentRegistry`] instance behind a
//! mutex, and `SharedPrinterStatus` holds the last known printer telemetry
//! behind a reader-writer lock. Both are created once at startup and handed
//! to the socket server, the printer client and teardown code as `Arc`s.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use top_ams::hal::MockStore;
//! use top_ams::services::{SharedPrinterStatus, SharedRegistry};
//! use top_ams::{FilamentRegistry, Metadata, RegistryAccess};
//!
//! let registry = Arc::new(SharedRegistry::new(FilamentRegistry::new(MockStore::new(), "filaments")));
//!
//! // Control handler mutates through the closure
//! let id = registry.with_registry(|r| r.add(2, Metadata::new("{}"))).unwrap();
//! assert_eq!(id, 1);
//!
//! // Telemetry callback merges partial reports
//! let status = SharedPrinterStatus::new();
//! status.apply_report(br#"{"print":{"bed_temper":60.0}}"#);
//! assert_eq!(status.snapshot().bed_temper, 60.0);
//! ```

use std::sync::{Mutex, RwLock};

use log::trace;

use crate::registry::{FilamentRecord, FilamentRegistry, RegistryAccess};
use crate::telemetry::{self, PrinterStatus};
use crate::traits::KvStore;

// ============================================================================
// Shared Registry
// ============================================================================

/// The single registry instance, shared across services.
///
/// Uses `Mutex` rather than `RwLock` because snapshot reads and mutations
/// must be serialized with each other and every mutation writes flash.
/// A poisoned lock is recovered rather than propagated.
pub struct SharedRegistry<S: KvStore> {
    registry: Mutex<FilamentRegistry<S>>,
}

impl<S: KvStore> SharedRegistry<S> {
    /// Wrap an initialized registry.
    pub fn new(registry: FilamentRegistry<S>) -> Self {
        Self {
            registry: Mutex::new(registry),
        }
    }

    /// Copy of all records, for read-only endpoints.
    pub fn records(&self) -> Vec<FilamentRecord> {
        self.with_registry(|r| r.records().to_vec())
    }

    /// Persist the current state. Used at shutdown.
    pub fn save(&self) -> bool {
        self.with_registry(|r| r.save())
    }
}

impl<S: KvStore> RegistryAccess for SharedRegistry<S> {
    type Store = S;

    fn with_registry<R>(&self, f: impl FnOnce(&mut FilamentRegistry<S>) -> R) -> R {
        let mut guard = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

// ============================================================================
// Shared Printer Status
// ============================================================================

/// Last known printer telemetry.
///
/// Written only by the printer client, read by status endpoints.
#[derive(Debug, Default)]
pub struct SharedPrinterStatus {
    status: RwLock<PrinterStatus>,
}

impl SharedPrinterStatus {
    /// Start from an all-zero status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract tracked fields from a raw report and merge them in.
    ///
    /// Returns true if the report carried any tracked field.
    pub fn apply_report(&self, payload: &[u8]) -> bool {
        let update = telemetry::extract(payload);
        if update.is_empty() {
            return false;
        }
        trace!("telemetry update {:?}", update);
        let mut status = self.status.write().unwrap_or_else(|e| e.into_inner());
        *status = telemetry::merge(&status, update);
        true
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> PrinterStatus {
        self.status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
