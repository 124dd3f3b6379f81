//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the storage, device and printer
//! traits, enabling development and testing on desktop without an ESP32
//! or a printer on the network.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockStore`] | [`KvStore`] | In-memory blobs with injectable failures |
//! | [`MockDevice`] | [`DeviceControl`] | Records reboots, reconnects and settings |
//! | [`MockPrinterLink`] | [`PrinterLink`] | Captures published commands |
//!
//! # Example
//!
//! ```rust
//! use top_ams::hal::MockStore;
//! use top_ams::{FilamentRegistry, Metadata};
//!
//! let mut registry = FilamentRegistry::new(MockStore::new(), "filaments");
//! registry.add(1, Metadata::new(r#"{"color":"red"}"#)).unwrap();
//!
//! // Every mutation commits
//! assert_eq!(registry.store().commit_count(), 1);
//! ```
//!
//! [`KvStore`]: crate::traits::KvStore
//! [`DeviceControl`]: crate::traits::DeviceControl
//! [`PrinterLink`]: crate::traits::PrinterLink

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::traits::KvStore;

#[cfg(feature = "std")]
use crate::commands::PrinterCommand;
#[cfg(feature = "std")]
use crate::settings::SettingKey;
#[cfg(feature = "std")]
use crate::traits::{DeviceControl, DeviceError, LinkError, PrinterLink};
#[cfg(feature = "std")]
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
#[cfg(feature = "std")]
use std::sync::Mutex;

// ============================================================================
// Storage Mock
// ============================================================================

/// Error injected by [`MockStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MockStoreError {
    /// `set` was configured to fail.
    #[error("set failed")]
    SetFailed,
    /// `commit` was configured to fail.
    #[error("commit failed")]
    CommitFailed,
}

/// In-memory key-value store.
///
/// Writes are staged by `set` and only become durable on `commit`, like
/// NVS. Reads see staged writes. [`durable`](Self::durable) returns what
/// would survive a power cut.
///
/// # Example
///
/// ```rust
/// use top_ams::hal::MockStore;
/// use top_ams::traits::KvStore;
///
/// let mut store = MockStore::new();
/// store.set("k", b"v").unwrap();
/// assert!(store.durable().get("k").unwrap().is_none());
///
/// store.commit().unwrap();
/// assert!(store.durable().get("k").unwrap().is_some());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockStore {
    committed: BTreeMap<String, Vec<u8>>,
    staged: BTreeMap<String, Vec<u8>>,
    fail_sets: bool,
    fail_commits: bool,
    set_count: usize,
    commit_count: usize,
}

impl MockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed value directly, bypassing failure injection.
    pub fn insert(&mut self, key: &str, value: &[u8]) {
        self.committed.insert(key.to_string(), value.to_vec());
    }

    /// Make every `set` fail.
    pub fn fail_sets(&mut self, fail: bool) {
        self.fail_sets = fail;
    }

    /// Make every `commit` fail.
    pub fn fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Number of successful `set` calls.
    pub fn set_count(&self) -> usize {
        self.set_count
    }

    /// Number of successful `commit` calls.
    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    /// Copy of only the committed contents, with no failures configured.
    pub fn durable(&self) -> Self {
        Self {
            committed: self.committed.clone(),
            ..Self::default()
        }
    }
}

impl KvStore for MockStore {
    type Error = MockStoreError;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self
            .staged
            .get(key)
            .or_else(|| self.committed.get(key))
            .cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        if self.fail_sets {
            return Err(MockStoreError::SetFailed);
        }
        self.staged.insert(key.to_string(), value.to_vec());
        self.set_count += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if self.fail_commits {
            return Err(MockStoreError::CommitFailed);
        }
        self.committed.append(&mut self.staged);
        self.commit_count += 1;
        Ok(())
    }
}

// ============================================================================
// Device Mock
// ============================================================================

/// Mock device recording every side effect.
///
/// Thread-safe so it can sit behind an `Arc` in the web server tests.
///
/// # Example
///
/// ```rust
/// use top_ams::hal::MockDevice;
/// use top_ams::traits::DeviceControl;
///
/// let device = MockDevice::new();
/// device.reboot();
/// assert_eq!(device.reboot_count(), 1);
/// ```
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct MockDevice {
    mac: [u8; 6],
    reboots: AtomicUsize,
    reconnects: AtomicUsize,
    fail_reconnect: AtomicBool,
    fail_settings: AtomicBool,
    settings: Mutex<Vec<(SettingKey, String)>>,
}

#[cfg(feature = "std")]
impl Default for MockDevice {
    fn default() -> Self {
        Self {
            mac: [0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56],
            reboots: AtomicUsize::new(0),
            reconnects: AtomicUsize::new(0),
            fail_reconnect: AtomicBool::new(false),
            fail_settings: AtomicBool::new(false),
            settings: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(feature = "std")]
impl MockDevice {
    /// Creates a mock device with a fixed MAC address.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific MAC address.
    pub fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
    }

    /// Make `reconnect_wifi` fail.
    pub fn set_fail_reconnect(&self, fail: bool) {
        self.fail_reconnect.store(fail, Ordering::SeqCst);
    }

    /// Make `apply_setting` fail.
    pub fn set_fail_settings(&self, fail: bool) {
        self.fail_settings.store(fail, Ordering::SeqCst);
    }

    /// Number of reboot requests.
    pub fn reboot_count(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }

    /// Number of successful reconnect requests.
    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Settings applied so far, oldest first.
    pub fn settings(&self) -> Vec<(SettingKey, String)> {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(feature = "std")]
impl DeviceControl for MockDevice {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn reconnect_wifi(&self) -> Result<(), DeviceError> {
        if self.fail_reconnect.load(Ordering::SeqCst) {
            return Err(DeviceError::Reconnect("mock failure".to_string()));
        }
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn reboot(&self) {
        self.reboots.fetch_add(1, Ordering::SeqCst);
    }

    fn apply_setting(&self, key: SettingKey, value: &str) -> Result<(), DeviceError> {
        if self.fail_settings.load(Ordering::SeqCst) {
            return Err(DeviceError::Storage {
                key: key.storage_key(),
                reason: "mock failure".to_string(),
            });
        }
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key, value.to_string()));
        Ok(())
    }
}

// ============================================================================
// Printer Mock
// ============================================================================

/// Mock printer link capturing published commands.
///
/// # Example
///
/// ```rust
/// use top_ams::commands::PrinterCommand;
/// use top_ams::hal::MockPrinterLink;
/// use top_ams::traits::PrinterLink;
///
/// let link = MockPrinterLink::new();
/// link.send(&PrinterCommand::Pause).unwrap();
/// assert_eq!(link.sent(), vec![PrinterCommand::Pause]);
///
/// let offline = MockPrinterLink::disconnected();
/// assert!(offline.send(&PrinterCommand::Pause).is_err());
/// ```
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct MockPrinterLink {
    connected: AtomicBool,
    sent: Mutex<Vec<PrinterCommand>>,
}

#[cfg(feature = "std")]
impl Default for MockPrinterLink {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(feature = "std")]
impl MockPrinterLink {
    /// Creates a connected mock link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a link that rejects every command.
    pub fn disconnected() -> Self {
        let link = Self::default();
        link.set_connected(false);
        link
    }

    /// Change the simulated connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Commands published so far, oldest first.
    pub fn sent(&self) -> Vec<PrinterCommand> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(feature = "std")]
impl PrinterLink for MockPrinterLink {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_writes_are_readable() {
        let mut store = MockStore::new();
        store.set("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.durable().get("a").unwrap(), None);
    }

    #[test]
    fn failed_commit_loses_staged_data_on_power_cut() {
        let mut store = MockStore::new();
        store.fail_commits(true);
        store.set("a", b"1").unwrap();
        assert_eq!(store.commit(), Err(MockStoreError::CommitFailed));
        assert_eq!(store.durable().get("a").unwrap(), None);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn failed_set() {
        let mut store = MockStore::new();
        store.fail_sets(true);
        assert_eq!(store.set("a", b"1"), Err(MockStoreError::SetFailed));
        assert_eq!(store.set_count(), 0);
    }

    #[test]
    fn insert_seeds_committed_data() {
        let mut store = MockStore::new();
        store.insert("k", b"v");
        assert_eq!(store.durable().get_str("k").unwrap().as_deref(), Some("v"));
    }

    #[cfg(feature = "std")]
    #[test]
    fn device_records_settings() {
        let device = MockDevice::new();
        device
            .apply_setting(SettingKey::WifiSsid, "Workshop")
            .unwrap();
        assert_eq!(
            device.settings(),
            vec![(SettingKey::WifiSsid, "Workshop".to_string())]
        );

        device.set_fail_settings(true);
        assert!(device.apply_setting(SettingKey::WifiSsid, "x").is_err());
        assert_eq!(device.settings().len(), 1);
    }
}
