//! Persisted device settings.
//!
//! Settings arrive over the control protocol as `{"type":"setting",
//! "key":..., "value":...}`, are stored one key per entry in the device's
//! key-value store, and are overlaid on the compiled-in [`Config`] at boot.

use log::{debug, warn};

use crate::config::{short_string, Config};
use crate::traits::KvStore;

/// A setting the control protocol may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// Wi-Fi network name.
    WifiSsid,
    /// Wi-Fi passphrase.
    WifiPassword,
    /// Printer LAN address.
    PrinterIp,
    /// Printer serial number.
    PrinterSerial,
    /// Printer LAN access code.
    PrinterAccessCode,
    /// Advertised device name.
    DeviceName,
}

impl SettingKey {
    /// Every key, in storage order.
    pub const ALL: [SettingKey; 6] = [
        SettingKey::WifiSsid,
        SettingKey::WifiPassword,
        SettingKey::PrinterIp,
        SettingKey::PrinterSerial,
        SettingKey::PrinterAccessCode,
        SettingKey::DeviceName,
    ];

    /// Parse the protocol name of a setting.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Protocol name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WifiSsid => "wifi_ssid",
            Self::WifiPassword => "wifi_password",
            Self::PrinterIp => "printer_ip",
            Self::PrinterSerial => "printer_serial",
            Self::PrinterAccessCode => "printer_access_code",
            Self::DeviceName => "device_name",
        }
    }

    /// Storage key. NVS limits keys to 15 bytes.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::WifiSsid => "wifi_ssid",
            Self::WifiPassword => "wifi_pass",
            Self::PrinterIp => "printer_ip",
            Self::PrinterSerial => "printer_sn",
            Self::PrinterAccessCode => "printer_code",
            Self::DeviceName => "device_name",
        }
    }

    /// Whether the value should be kept out of logs.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::WifiPassword | Self::PrinterAccessCode)
    }
}

impl core::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store a setting value and commit.
pub fn persist_setting<S: KvStore>(
    store: &mut S,
    key: SettingKey,
    value: &str,
) -> Result<(), S::Error> {
    store.set(key.storage_key(), value.as_bytes())?;
    store.commit()?;
    if key.is_secret() {
        debug!("stored setting {}", key);
    } else {
        debug!("stored setting {} = {}", key, value);
    }
    Ok(())
}

/// Apply one setting value to a config in place.
pub fn apply_setting(config: &mut Config, key: SettingKey, value: &str) {
    match key {
        SettingKey::WifiSsid => config.wifi.ssid = short_string(value),
        SettingKey::WifiPassword => config.wifi.password = short_string(value),
        SettingKey::PrinterIp => config.printer.host = short_string(value),
        SettingKey::PrinterSerial => config.printer.serial = short_string(value),
        SettingKey::PrinterAccessCode => config.printer.access_code = short_string(value),
        SettingKey::DeviceName => config.device.name = short_string(value),
    }
}

/// Overlay every stored setting onto `config`.
///
/// Missing keys keep the compiled-in value. Read errors are logged and
/// skipped.
pub fn load_settings<S: KvStore>(store: &S, mut config: Config) -> Config {
    for key in SettingKey::ALL {
        match store.get_str(key.storage_key()) {
            Ok(Some(value)) => apply_setting(&mut config, key, &value),
            Ok(None) => {}
            Err(e) => warn!("failed to read setting {}: {:?}", key, e),
        }
    }
    config
}

/// Render the non-secret settings of a config, for startup logs.
pub fn describe(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "wifi_ssid": config.wifi.ssid.as_str(),
        "printer_ip": config.printer.host.as_str(),
        "printer_serial": config.printer.serial.as_str(),
        "device_name": config.device.name.as_str(),
        "printer_configured": config.printer.is_configured(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockStore;

    #[test]
    fn parse_round_trip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::parse("volume"), None);
    }

    #[test]
    fn storage_keys_fit_nvs() {
        for key in SettingKey::ALL {
            assert!(key.storage_key().len() <= 15, "{} too long", key);
        }
    }

    #[test]
    fn persisted_settings_overlay_config() {
        let mut store = MockStore::new();
        persist_setting(&mut store, SettingKey::WifiSsid, "Workshop").unwrap();
        persist_setting(&mut store, SettingKey::PrinterIp, "192.168.1.50").unwrap();

        let config = load_settings(&store, Config::default());
        assert_eq!(config.wifi.ssid.as_str(), "Workshop");
        assert_eq!(config.printer.host.as_str(), "192.168.1.50");
        // Untouched keys keep their defaults
        assert_eq!(config.device.name.as_str(), "TopAMS");
    }

    #[test]
    fn persist_propagates_commit_failure() {
        let mut store = MockStore::new();
        store.fail_commits(true);
        assert!(persist_setting(&mut store, SettingKey::DeviceName, "ams").is_err());
    }

    #[test]
    fn describe_hides_secrets() {
        let mut config = Config::default();
        apply_setting(&mut config, SettingKey::WifiPassword, "hunter2");
        apply_setting(&mut config, SettingKey::PrinterAccessCode, "12345678");
        let text = describe(&config).to_string();
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("12345678"));
    }
}
