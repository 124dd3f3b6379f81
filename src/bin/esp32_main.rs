//! ESP32-C3 filament feeder firmware.
//!
//! Startup order:
//! - Load settings and the filament registry from NVS
//! - Join Wi-Fi (if credentials are stored or compiled in)
//! - Advertise `<device name>.local` over mDNS
//! - Connect to the printer over MQTT (if configured)
//! - Serve the control socket
//!
//! # Build
//!
//! ```bash
//! # Storage and device control only
//! cargo build --release --features esp32
//!
//! # Full firmware (Wi-Fi + control socket + printer MQTT + mDNS)
//! WIFI_SSID=... WIFI_PASSWORD=... cargo build --release --features esp32-net
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{debug, info};

use top_ams::hal::esp32::{Esp32Device, Esp32Store};
use top_ams::services::{SharedPrinterStatus, SharedRegistry};
use top_ams::settings::{describe, load_settings};
use top_ams::traits::{format_mac, DeviceControl};
use top_ams::{Config, FilamentRegistry, RegistryAccess, WifiConfig};

/// Idle loop period. All work happens on service threads.
const IDLE_INTERVAL: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("top-ams {} starting", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // =========================================================================
    // Configuration
    // =========================================================================
    // Compile-time credentials seed a fresh device; stored settings win
    let defaults = Config::default().with_wifi(
        WifiConfig::default()
            .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
            .with_password(option_env!("WIFI_PASSWORD").unwrap_or("")),
    );
    let namespace = defaults.device.nvs_namespace.clone();
    let settings = Esp32Store::open(nvs.clone(), namespace.as_str())?;
    let config = load_settings(&settings, defaults);
    info!("settings: {}", describe(&config));

    // =========================================================================
    // Filament Registry
    // =========================================================================
    let mut registry = FilamentRegistry::new(
        Esp32Store::open(nvs.clone(), namespace.as_str())?,
        config.registry.storage_key.as_str(),
    );
    registry.init();
    info!("{} filament(s) registered", registry.len());
    let registry = Arc::new(SharedRegistry::new(registry));

    let device = Esp32Device::new(settings);
    info!(
        "device '{}' MAC {}",
        config.device.name,
        format_mac(&device.mac_address())
    );

    // =========================================================================
    // Wi-Fi
    // =========================================================================
    #[cfg(feature = "wifi")]
    let device = {
        use std::sync::Mutex;
        use top_ams::hal::esp32::Esp32Wifi;

        if config.wifi.is_configured() {
            let wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?;
            info!("wifi up: {:?}", wifi.ip_addr());
            device.with_wifi(Arc::new(Mutex::new(wifi)))
        } else {
            info!("wifi not configured, skipping (set wifi_ssid over the control socket or WIFI_SSID at build time)");
            device
        }
    };
    #[cfg(not(feature = "wifi"))]
    let _ = (peripherals, sysloop, nvs);

    // =========================================================================
    // mDNS
    // =========================================================================
    #[cfg(feature = "esp32-mdns")]
    let _mdns = {
        use log::warn;
        use top_ams::hal::esp32::Esp32Mdns;

        match Esp32Mdns::start(&config.device, &config.web) {
            Ok(mdns) => Some(mdns),
            Err(e) => {
                warn!("mDNS failed to start: {:?}", e);
                None
            }
        }
    };

    let device = Arc::new(device);
    let status = Arc::new(SharedPrinterStatus::new());

    // =========================================================================
    // Printer MQTT
    // =========================================================================
    #[cfg(feature = "esp32-mqtt")]
    let printer = {
        use log::warn;
        use top_ams::hal::esp32::Esp32PrinterMqtt;

        if config.printer.enabled && config.printer.is_configured() {
            match Esp32PrinterMqtt::new(&config.printer, Arc::clone(&status)) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("printer client failed to start: {:?}", e);
                    None
                }
            }
        } else {
            info!("printer not configured, skipping");
            None
        }
    };
    #[cfg(not(feature = "esp32-mqtt"))]
    let printer = top_ams::NoPrinter;

    // =========================================================================
    // Control Socket
    // =========================================================================
    #[cfg(feature = "esp32-ws")]
    let _server = {
        use top_ams::hal::esp32::Esp32WsServer;
        use top_ams::Dispatcher;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&device),
            printer,
        ));
        Esp32WsServer::new(&config.web, dispatcher)?
    };
    #[cfg(not(feature = "esp32-ws"))]
    let _ = printer;

    info!("startup complete");

    loop {
        thread::sleep(IDLE_INTERVAL);
        let snapshot = status.snapshot();
        debug!(
            "nozzle {:.1} bed {:.1} wifi {} filaments {}",
            snapshot.nozzle_temper,
            snapshot.bed_temper,
            snapshot.wifi_signal,
            registry.with_registry(|r| r.len())
        );
    }
}
