//! NVS-backed key-value store.
//!
//! One NVS namespace holds both the filament snapshot and the device
//! settings. NVS commits inside every blob write, so [`KvStore::commit`]
//! has nothing left to flush.
//!
//! # Example
//!
//! ```ignore
//! use top_ams::hal::esp32::Esp32Store;
//!
//! let nvs = EspDefaultNvsPartition::take()?;
//! let store = Esp32Store::open(nvs.clone(), "storage")?;
//! ```

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_sys::EspError;

use crate::traits::KvStore;

/// [`KvStore`] over one NVS namespace.
pub struct Esp32Store {
    nvs: EspNvs<NvsDefault>,
}

impl Esp32Store {
    /// Open `namespace` read-write on the default partition.
    pub fn open(partition: EspDefaultNvsPartition, namespace: &str) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, namespace, true)?;
        Ok(Self { nvs })
    }
}

impl KvStore for Esp32Store {
    type Error = EspError;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let Some(len) = self.nvs.blob_len(key)? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; len];
        let data = self.nvs.get_blob(key, &mut buf)?;
        Ok(data.map(<[u8]>::to_vec))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.nvs.set_blob(key, value)
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
