//! Persistent filament registry.
//!
//! The registry is the authoritative record of which spool sits on which
//! feeder motor. It owns the full record set, allocates ids, and writes
//! its whole state as one JSON array to a [`KvStore`] after every
//! successful mutation.
//!
//! Guarantees:
//! - ids are unique and never reused once `next_id` has moved past them
//! - motor ids are unique across live records
//! - a snapshot load is all-or-nothing: one bad record leaves the registry empty
//!
//! # Example
//!
//! ```rust
//! use top_ams::hal::MockStore;
//! use top_ams::{FilamentRegistry, Metadata, RegistryError};
//!
//! let mut registry = FilamentRegistry::new(MockStore::new(), "filaments");
//! registry.init();
//!
//! let id = registry.add(3, Metadata::new("{}")).unwrap();
//! assert_eq!(id, 1);
//! assert_eq!(
//!     registry.add(3, Metadata::new("{}")),
//!     Err(RegistryError::DuplicateMotor(3))
//! );
//! ```

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::traits::KvStore;

/// Default storage key for the registry snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "filaments";

// ============================================================================
// Types
// ============================================================================

/// One spool loaded on one feeder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilamentRecord {
    /// Registry-assigned identifier, immutable after creation.
    pub id: i32,
    /// Feeder motor the spool is loaded on.
    pub motor_id: i32,
    /// Client-supplied JSON metadata, stored verbatim.
    pub metadata: Metadata,
}

/// Rejected registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another record already uses this motor.
    #[error("motor {0} already in use")]
    DuplicateMotor(i32),
    /// No record has this id.
    #[error("filament {0} not found")]
    UnknownId(i32),
    /// The id space is used up.
    #[error("no filament ids left")]
    IdsExhausted,
}

/// Why a snapshot was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Not a JSON array of well-formed records.
    #[error("malformed snapshot: {0}")]
    Malformed(String),
    /// Two records share an id.
    #[error("duplicate id {0} in snapshot")]
    DuplicateId(i32),
    /// Two records share a motor.
    #[error("duplicate motor {0} in snapshot")]
    DuplicateMotor(i32),
}

// ============================================================================
// Registry
// ============================================================================

/// Filament registry backed by a key-value store.
///
/// Construct once, call [`init`](Self::init) to load persisted state, then
/// share it behind a lock. Every successful `add`, `update` and `remove`
/// saves synchronously. Storage failures are logged and do not change the
/// in-memory outcome of the call. Dropping the registry attempts one last save.
pub struct FilamentRegistry<S: KvStore> {
    store: S,
    storage_key: String,
    filaments: Vec<FilamentRecord>,
    next_id: i32,
}

impl<S: KvStore> FilamentRegistry<S> {
    /// Create an empty registry. Nothing is loaded until [`init`](Self::init).
    pub fn new(store: S, storage_key: &str) -> Self {
        Self {
            store,
            storage_key: storage_key.to_string(),
            filaments: Vec::new(),
            next_id: 1,
        }
    }

    /// Load persisted state.
    ///
    /// A missing key yields an empty registry. An unreadable or invalid
    /// snapshot is logged and also yields an empty registry.
    pub fn init(&mut self) {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("no stored filaments under '{}', starting empty", self.storage_key);
                return;
            }
            Err(e) => {
                error!("failed to read filaments: {:?}", e);
                return;
            }
        };

        let Ok(text) = core::str::from_utf8(&raw) else {
            warn!("stored filaments are not valid UTF-8, starting empty");
            return;
        };

        match self.from_snapshot(text) {
            Ok(()) => info!(
                "loaded {} filaments, next id {}",
                self.filaments.len(),
                self.next_id
            ),
            Err(e) => warn!("discarding stored filaments: {}", e),
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Register a spool on `motor_id`. Returns the new id.
    pub fn add(&mut self, motor_id: i32, metadata: Metadata) -> Result<i32, RegistryError> {
        if self.get_by_motor(motor_id).is_some() {
            warn!("add rejected: motor {} already in use", motor_id);
            return Err(RegistryError::DuplicateMotor(motor_id));
        }

        let id = self.allocate_id()?;
        self.filaments.push(FilamentRecord {
            id,
            motor_id,
            metadata,
        });
        debug!("added filament {} on motor {}", id, motor_id);
        self.save();
        Ok(id)
    }

    /// Remove a record. `next_id` is never rewound.
    pub fn remove(&mut self, id: i32) -> Result<FilamentRecord, RegistryError> {
        let index = self.position(id).ok_or(RegistryError::UnknownId(id))?;
        let removed = self.filaments.remove(index);
        debug!("removed filament {}", id);
        self.save();
        Ok(removed)
    }

    /// Change a record's motor and/or metadata.
    ///
    /// `None` leaves a field unchanged, as does empty metadata. If the new
    /// motor collides with another record nothing is modified.
    pub fn update(
        &mut self,
        id: i32,
        motor_id: Option<i32>,
        metadata: Option<Metadata>,
    ) -> Result<(), RegistryError> {
        let index = self.position(id).ok_or(RegistryError::UnknownId(id))?;

        if let Some(motor) = motor_id {
            if self
                .filaments
                .iter()
                .any(|f| f.motor_id == motor && f.id != id)
            {
                warn!("update of {} rejected: motor {} already in use", id, motor);
                return Err(RegistryError::DuplicateMotor(motor));
            }
        }

        let record = &mut self.filaments[index];
        if let Some(motor) = motor_id {
            record.motor_id = motor;
        }
        if let Some(meta) = metadata.filter(|m| !m.is_empty()) {
            record.metadata = meta;
        }
        debug!("updated filament {}", id);
        self.save();
        Ok(())
    }

    /// Drop every record and reset the id counter. Not persisted.
    pub fn clear(&mut self) {
        self.filaments.clear();
        self.next_id = 1;
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Record with the given id.
    pub fn get_by_id(&self, id: i32) -> Option<&FilamentRecord> {
        self.filaments.iter().find(|f| f.id == id)
    }

    /// Record loaded on the given motor.
    pub fn get_by_motor(&self, motor_id: i32) -> Option<&FilamentRecord> {
        self.filaments.iter().find(|f| f.motor_id == motor_id)
    }

    /// Records whose metadata field `key` renders to exactly `value`.
    ///
    /// See [`Metadata::field`] for how values are rendered. Records with
    /// unparsable metadata or without the key never match.
    pub fn find_by_metadata_field(&self, key: &str, value: &str) -> Vec<&FilamentRecord> {
        self.filaments
            .iter()
            .filter(|f| f.metadata.field(key).as_deref() == Some(value))
            .collect()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[FilamentRecord] {
        &self.filaments
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.filaments.len()
    }

    /// True when no records are registered.
    pub fn is_empty(&self) -> bool {
        self.filaments.is_empty()
    }

    /// Next id the allocator will try.
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    /// Storage key the snapshot is saved under.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ------------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------------

    /// Serialize all records as a compact JSON array.
    pub fn to_snapshot(&self) -> String {
        serde_json::to_string(&self.filaments).unwrap_or_else(|_| String::from("[]"))
    }

    /// Replace the registry contents with a snapshot.
    ///
    /// On any error the registry is left empty with `next_id` reset to 1.
    /// On success `next_id` is one past the highest loaded id.
    pub fn from_snapshot(&mut self, snapshot: &str) -> Result<(), SnapshotError> {
        self.clear();

        let records: Vec<FilamentRecord> = serde_json::from_str(snapshot)
            .map_err(|e| SnapshotError::Malformed(e.to_string()))?;

        for (i, record) in records.iter().enumerate() {
            let earlier = &records[..i];
            if earlier.iter().any(|r| r.id == record.id) {
                return Err(SnapshotError::DuplicateId(record.id));
            }
            if earlier.iter().any(|r| r.motor_id == record.motor_id) {
                return Err(SnapshotError::DuplicateMotor(record.motor_id));
            }
        }

        let max_id = records.iter().map(|r| r.id).max().unwrap_or(0);
        self.next_id = max_id
            .checked_add(1)
            .ok_or_else(|| SnapshotError::Malformed("id out of range".to_string()))?;
        self.filaments = records;
        Ok(())
    }

    /// Write the snapshot to storage and commit.
    ///
    /// Failures are logged and reported through the return value only.
    pub fn save(&mut self) -> bool {
        let snapshot = self.to_snapshot();
        let result = self
            .store
            .set(&self.storage_key, snapshot.as_bytes())
            .and_then(|()| self.store.commit());

        match result {
            Ok(()) => {
                debug!("saved {} filaments", self.filaments.len());
                true
            }
            Err(e) => {
                error!("failed to save filaments: {:?}", e);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn position(&self, id: i32) -> Option<usize> {
        self.filaments.iter().position(|f| f.id == id)
    }

    /// First free id at or after the cursor; the cursor moves past it.
    fn allocate_id(&mut self) -> Result<i32, RegistryError> {
        while self.get_by_id(self.next_id).is_some() {
            self.next_id = self
                .next_id
                .checked_add(1)
                .ok_or(RegistryError::IdsExhausted)?;
        }
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(RegistryError::IdsExhausted)?;
        Ok(id)
    }
}

impl<S: KvStore> Drop for FilamentRegistry<S> {
    fn drop(&mut self) {
        self.save();
    }
}

impl<S: KvStore> core::fmt::Debug for FilamentRegistry<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilamentRegistry")
            .field("storage_key", &self.storage_key)
            .field("filaments", &self.filaments)
            .field("next_id", &self.next_id)
            .finish()
    }
}

// ============================================================================
// Registry Access
// ============================================================================

/// Scoped mutable access to the single registry instance.
///
/// The closure runs with the registry exclusively borrowed, so every
/// operation, snapshot reads included, is serialized. Implemented by
/// `services::SharedRegistry` (mutex) and by `RefCell` for single-threaded use.
pub trait RegistryAccess {
    /// Store backing the registry.
    type Store: KvStore;

    /// Run `f` with exclusive access to the registry.
    fn with_registry<R>(&self, f: impl FnOnce(&mut FilamentRegistry<Self::Store>) -> R) -> R;
}

impl<S: KvStore> RegistryAccess for RefCell<FilamentRegistry<S>> {
    type Store = S;

    fn with_registry<R>(&self, f: impl FnOnce(&mut FilamentRegistry<S>) -> R) -> R {
        f(&mut self.borrow_mut())
    }
}

impl<T: RegistryAccess + ?Sized> RegistryAccess for Arc<T> {
    type Store = T::Store;

    fn with_registry<R>(&self, f: impl FnOnce(&mut FilamentRegistry<Self::Store>) -> R) -> R {
        (**self).with_registry(f)
    }
}

impl<T: RegistryAccess + ?Sized> RegistryAccess for &T {
    type Store = T::Store;

    fn with_registry<R>(&self, f: impl FnOnce(&mut FilamentRegistry<Self::Store>) -> R) -> R {
        (**self).with_registry(f)
    }
}

// ============================================================================
// Tests
// ============================================================================
