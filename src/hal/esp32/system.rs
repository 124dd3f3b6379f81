//! Chip-level device control: MAC, restart, settings and Wi-Fi reconnect.

use std::sync::Mutex;
#[cfg(feature = "wifi")]
use std::sync::Arc;

use esp_idf_sys::{esp, esp_mac_type_t_ESP_MAC_WIFI_STA, esp_read_mac};
use log::{info, warn};

use crate::config::Config;
use crate::settings::{load_settings, persist_setting, SettingKey};
use crate::traits::{DeviceControl, DeviceError};

use super::Esp32Store;
#[cfg(feature = "wifi")]
use super::Esp32Wifi;

/// [`DeviceControl`] for the ESP32-C3.
///
/// Settings are written to their own NVS handle. Wi-Fi reconnects re-read
/// the stored credentials so a freshly saved SSID takes effect.
pub struct Esp32Device {
    settings: Mutex<Esp32Store>,
    #[cfg(feature = "wifi")]
    wifi: Option<Arc<Mutex<Esp32Wifi<'static>>>>,
}

impl Esp32Device {
    /// Device control over a settings store, without Wi-Fi.
    pub fn new(settings: Esp32Store) -> Self {
        Self {
            settings: Mutex::new(settings),
            #[cfg(feature = "wifi")]
            wifi: None,
        }
    }

    /// Attach the station connection used by `reconnect_wifi`.
    #[cfg(feature = "wifi")]
    pub fn with_wifi(mut self, wifi: Arc<Mutex<Esp32Wifi<'static>>>) -> Self {
        self.wifi = Some(wifi);
        self
    }

    /// Current configuration: defaults overlaid with stored settings.
    pub fn stored_config(&self) -> Config {
        let store = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        load_settings(&*store, Config::default())
    }
}

impl DeviceControl for Esp32Device {
    fn mac_address(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        // SAFETY: `mac` is six writable bytes, as the station MAC requires
        if let Err(e) = esp!(unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_WIFI_STA) }) {
            warn!("esp_read_mac failed: {}", e);
        }
        mac
    }

    #[cfg(feature = "wifi")]
    fn reconnect_wifi(&self) -> Result<(), DeviceError> {
        let wifi = self
            .wifi
            .as_ref()
            .ok_or_else(|| DeviceError::Reconnect("wifi not started".into()))?;
        let config = self.stored_config().wifi;
        let mut wifi = wifi.lock().unwrap_or_else(|e| e.into_inner());
        wifi.reconnect(&config)
            .map_err(|e| DeviceError::Reconnect(e.to_string()))
    }

    #[cfg(not(feature = "wifi"))]
    fn reconnect_wifi(&self) -> Result<(), DeviceError> {
        Err(DeviceError::Reconnect("wifi support not built".into()))
    }

    fn reboot(&self) {
        info!("restarting");
        esp_idf_hal::reset::restart();
    }

    fn apply_setting(&self, key: SettingKey, value: &str) -> Result<(), DeviceError> {
        let mut store = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        persist_setting(&mut *store, key, value).map_err(|e| DeviceError::Storage {
            key: key.storage_key(),
            reason: e.to_string(),
        })
    }
}
