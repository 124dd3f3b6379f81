//! ESP32-C3 hardware abstraction layer for the filament feeder.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 (RISC-V 160MHz, 4MB Flash)
//! - **Storage**: one NVS namespace for the filament snapshot and settings
//! - **Network**: station-mode Wi-Fi, control socket server, printer MQTT over TLS,
//!   mDNS advertisement
//!
//! Feeder motor drivers are outside this crate; the registry only tracks
//! which motor id each filament is loaded on.

mod nvs;
mod system;

pub use nvs::Esp32Store;
pub use system::Esp32Device;

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Wifi;

#[cfg(feature = "esp32-ws")]
mod ws;
#[cfg(feature = "esp32-ws")]
pub use ws::Esp32WsServer;

#[cfg(feature = "esp32-mqtt")]
mod mqtt;
#[cfg(feature = "esp32-mqtt")]
pub use mqtt::Esp32PrinterMqtt;

#[cfg(feature = "esp32-mdns")]
mod mdns;
#[cfg(feature = "esp32-mdns")]
pub use mdns::Esp32Mdns;
