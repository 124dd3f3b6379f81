//! Durable key-value storage abstraction.
//!
//! The registry and the settings layer persist through a single narrow
//! interface. On ESP32 this is an NVS namespace; on desktop it is a
//! directory of files; in tests it is [`crate::hal::MockStore`].

use alloc::vec::Vec;
use core::fmt::Debug;

/// Key-value store holding opaque blobs.
///
/// A missing key is not an error: `get` returns `Ok(None)`.
/// Writes become durable only after `commit` succeeds.
///
/// # Example
///
/// ```rust
/// use top_ams::hal::MockStore;
/// use top_ams::traits::KvStore;
///
/// let mut store = MockStore::new();
/// assert_eq!(store.get("filaments").unwrap(), None);
///
/// store.set("filaments", b"[]").unwrap();
/// store.commit().unwrap();
/// assert_eq!(store.get("filaments").unwrap().as_deref(), Some(&b"[]"[..]));
/// ```
pub trait KvStore {
    /// Error type for storage operations.
    type Error: Debug;

    /// Read the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stage `value` under `key`, replacing any previous blob.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error>;

    /// Flush staged writes to durable storage.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Read `key` as UTF-8 text. Invalid UTF-8 is treated as absent.
    fn get_str(&self, key: &str) -> Result<Option<alloc::string::String>, Self::Error> {
        Ok(self
            .get(key)?
            .and_then(|bytes| alloc::string::String::from_utf8(bytes).ok()))
    }
}
