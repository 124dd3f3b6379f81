//! WiFi connection management for ESP32-C3.
//!
//! Provides synchronous WiFi station mode connection using esp-idf-svc.
//!
//! # Example
//!
//! ```ignore
//! use top_ams::hal::esp32::Esp32Wifi;
//! use top_ams::config::WifiConfig;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("MyNetwork")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(modem, sysloop, nvs, &config)?;
//! // WiFi is now connected and has an IP address
//! log::info!("IP: {:?}", wifi.ip_addr());
//! ```

use std::net::Ipv4Addr;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;

use crate::config::{truncated, WifiConfig};

/// WiFi connection manager for ESP32.
///
/// Manages a station-mode WiFi connection. The connection is established
/// during construction and maintained for the lifetime of this struct.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> Esp32Wifi<'a> {
    /// Create a new WiFi connection.
    ///
    /// This will:
    /// 1. Initialize the WiFi driver
    /// 2. Configure station mode with the provided credentials
    /// 3. Connect to the access point
    /// 4. Wait for DHCP to assign an IP address
    ///
    /// # Errors
    ///
    /// Returns an error if initialization, association or DHCP fails.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        wifi.set_configuration(&client_configuration(config))?;

        info!("wifi starting");
        wifi.start()?;

        info!("wifi connecting to '{}'", config.ssid);
        wifi.connect()?;

        info!("wifi waiting for DHCP");
        wifi.wait_netif_up()?;

        if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
            info!("wifi connected, IP {}", ip_info.ip);
        }

        Ok(Self { wifi })
    }

    /// Get the current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    /// Check if WiFi is connected.
    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    /// Drop the current association and start a new one with `config`.
    ///
    /// Returns once the attempt is started; association and DHCP finish
    /// in the background.
    pub fn reconnect(&mut self, config: &WifiConfig) -> anyhow::Result<()> {
        let driver = self.wifi.wifi_mut();
        // Not being associated is fine here
        let _ = driver.disconnect();
        driver.set_configuration(&client_configuration(config))?;
        driver.connect()?;
        info!("wifi reconnecting to '{}'", config.ssid);
        Ok(())
    }
}

fn client_configuration(config: &WifiConfig) -> Configuration {
    // esp-idf caps SSID and passphrase lengths
    Configuration::Client(ClientConfiguration {
        ssid: truncated::<32>(config.ssid.as_str()),
        password: truncated::<64>(config.password.as_str()),
        ..Default::default()
    })
}
