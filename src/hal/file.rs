//! File-backed storage and device control for desktop runs.
//!
//! Each key is one file in a directory. Writes are staged in memory and
//! written on commit through a temporary file and a rename, so a crash
//! mid-commit leaves the previous value intact.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info, warn};

use crate::config::Config;
use crate::settings::{load_settings, persist_setting, SettingKey};
use crate::traits::{DeviceControl, DeviceError, KvStore};

/// Directory-backed [`KvStore`].
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    staged: BTreeMap<String, Vec<u8>>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!("file store at {}", dir.display());
        Ok(Self {
            dir,
            staged: BTreeMap::new(),
        })
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key '{}'", key),
            ));
        }
        Ok(self.dir.join(key))
    }
}

impl KvStore for FileStore {
    type Error = io::Error;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(Some(staged.clone()));
        }
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.path_for(key)?;
        self.staged.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        for (key, value) in &self.staged {
            let path = self.path_for(key)?;
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, value)?;
            fs::rename(&tmp, &path)?;
        }
        self.staged.clear();
        Ok(())
    }
}

// ============================================================================
// Desktop Device
// ============================================================================

/// [`DeviceControl`] for desktop runs.
///
/// Settings land in a [`FileStore`] so they survive a restart of the
/// process. There is no radio: reconnects only log, and a reboot request
/// leaves the process running.
#[derive(Debug)]
pub struct FileDevice {
    mac: [u8; 6],
    settings: Mutex<FileStore>,
}

impl FileDevice {
    /// Device control persisting settings into `settings`.
    pub fn new(settings: FileStore) -> Self {
        Self {
            mac: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
            settings: Mutex::new(settings),
        }
    }

    /// Report a specific MAC address.
    pub fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
    }

    /// `defaults` overlaid with the stored settings.
    pub fn stored_config(&self, defaults: Config) -> Config {
        let store = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        load_settings(&*store, defaults)
    }
}

impl DeviceControl for FileDevice {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn reconnect_wifi(&self) -> Result<(), DeviceError> {
        info!("wifi reconnect requested (no radio on desktop)");
        Ok(())
    }

    fn reboot(&self) {
        warn!("restart requested; stored settings apply on the next start");
    }

    fn apply_setting(&self, key: SettingKey, value: &str) -> Result<(), DeviceError> {
        let mut store = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        persist_setting(&mut *store, key, value).map_err(|e| DeviceError::Storage {
            key: key.storage_key(),
            reason: e.to_string(),
        })
    }
}
