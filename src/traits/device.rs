//! Device-level side effects reachable from the control protocol.
//!
//! These are the operations behind the `system` and `setting` request
//! types. They touch the radio, the chip and flash, so they live behind a
//! trait and are mocked on desktop.

use alloc::string::String;
use alloc::sync::Arc;

use crate::settings::SettingKey;

/// Error from a device-level operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Wi-Fi reconnection could not be started.
    #[error("wifi reconnect failed: {0}")]
    Reconnect(String),
    /// A setting could not be persisted.
    #[error("failed to store setting {key}: {reason}")]
    Storage {
        /// Storage key of the setting.
        key: &'static str,
        /// Underlying storage error, rendered.
        reason: String,
    },
}

/// Device-level operations used by the dispatcher.
///
/// All methods take `&self`; implementations synchronize internally so a
/// single instance can be shared across the socket handler and startup code.
pub trait DeviceControl {
    /// Station MAC address of the device.
    fn mac_address(&self) -> [u8; 6];

    /// Begin reconnecting Wi-Fi. Returns once the attempt is initiated.
    fn reconnect_wifi(&self) -> Result<(), DeviceError>;

    /// Restart the device. On hardware this does not return.
    fn reboot(&self);

    /// Persist a validated setting value.
    fn apply_setting(&self, key: SettingKey, value: &str) -> Result<(), DeviceError>;
}

impl<T: DeviceControl + ?Sized> DeviceControl for Arc<T> {
    fn mac_address(&self) -> [u8; 6] {
        (**self).mac_address()
    }

    fn reconnect_wifi(&self) -> Result<(), DeviceError> {
        (**self).reconnect_wifi()
    }

    fn reboot(&self) {
        (**self).reboot()
    }

    fn apply_setting(&self, key: SettingKey, value: &str) -> Result<(), DeviceError> {
        (**self).apply_setting(key, value)
    }
}

/// Render a MAC address as upper-case colon-separated hex.
///
/// ```rust
/// use top_ams::traits::format_mac;
///
/// assert_eq!(format_mac(&[0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]), "24:0A:C4:00:01:FF");
/// ```
pub fn format_mac(mac: &[u8; 6]) -> String {
    alloc::format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0],
        mac[1],
        mac[2],
        mac[3],
        mac[4],
        mac[5]
    )
}
