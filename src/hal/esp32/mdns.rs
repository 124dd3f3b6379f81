//! mDNS advertisement of the control socket.
//!
//! Publishes `<hostname>.local` and a `_ws._tcp` service pointing at the
//! control socket so clients can find the feeder without knowing its address.

use esp_idf_svc::mdns::EspMdns;
use log::info;

use crate::config::{DeviceConfig, WebConfig};

/// Service type clients browse for.
const SERVICE_TYPE: &str = "_ws";
const SERVICE_PROTO: &str = "_tcp";

/// Running mDNS responder. Dropping it stops advertising.
pub struct Esp32Mdns {
    _mdns: EspMdns,
}

impl Esp32Mdns {
    /// Start the responder. Call once the station has an address.
    pub fn start(device: &DeviceConfig, web: &WebConfig) -> anyhow::Result<Self> {
        let hostname = device.hostname();
        let mut mdns = EspMdns::take()?;
        mdns.set_hostname(hostname.as_str())?;
        mdns.set_instance_name(device.name.as_str())?;
        mdns.add_service(
            Some(device.name.as_str()),
            SERVICE_TYPE,
            SERVICE_PROTO,
            web.port,
            &[("path", web.ws_path.as_str())],
        )?;

        info!(
            "mDNS: {}.local advertising {}.{} on port {}",
            hostname, SERVICE_TYPE, SERVICE_PROTO, web.port
        );
        Ok(Self { _mdns: mdns })
    }
}
