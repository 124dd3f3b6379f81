//! Desktop printer client over `rumqttc`.
//!
//! Connects to the printer's broker over TLS, subscribes to its report
//! topic and merges every report into [`SharedPrinterStatus`]. The client
//! half implements [`PrinterLink`] so the dispatcher can publish commands
//! on the request topic.
//!
//! ```ignore
//! let status = Arc::new(SharedPrinterStatus::new());
//! let (client, events) = PrinterClient::new(PrinterRuntimeConfig::from_config(&config.printer), Arc::clone(&status));
//! tokio::spawn(events.run());
//! let app = AppState::new(registry, status, device, client);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};

use crate::commands::PrinterCommand;
use crate::config::PrinterConfig;
use crate::traits::{LinkError, PrinterLink};

use super::shared::SharedPrinterStatus;

// ============================================================================
// Configuration
// ============================================================================

/// Runtime printer connection settings for `rumqttc`.
///
/// Owned-string counterpart of [`PrinterConfig`].
#[derive(Debug, Clone)]
pub struct PrinterRuntimeConfig {
    /// Printer hostname or IP
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Printer serial, used in topic names
    pub serial: String,
    /// LAN access code, used as the password
    pub access_code: String,
    /// Broker username
    pub username: String,
    /// Client ID
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Delay before retrying after a connection error
    pub reconnect_ms: u64,
}

impl Default for PrinterRuntimeConfig {
    fn default() -> Self {
        Self::from_config(&PrinterConfig::default())
    }
}

impl PrinterRuntimeConfig {
    /// Create from shared PrinterConfig
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            host: config.host.as_str().to_string(),
            port: config.port,
            serial: config.serial.as_str().to_string(),
            access_code: config.access_code.as_str().to_string(),
            username: config.username.as_str().to_string(),
            client_id: config.client_id.as_str().to_string(),
            keep_alive_secs: config.keep_alive_secs,
            reconnect_ms: config.reconnect_ms as u64,
        }
    }

    /// Topic the printer publishes status on
    pub fn report_topic(&self) -> String {
        format!("device/{}/report", self.serial)
    }

    /// Topic the printer accepts commands on
    pub fn request_topic(&self) -> String {
        format!("device/{}/request", self.serial)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_credentials(&self.username, &self.access_code);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs as u64));
        options.set_clean_session(true);

        // Printers present self-signed certificates
        let tls = TlsConfiguration::Simple {
            ca: vec![],
            alpn: None,
            client_auth: None,
        };
        options.set_transport(Transport::tls_with_config(tls));
        options
    }
}

// ============================================================================
// Client
// ============================================================================

/// Command half of the printer connection.
#[derive(Clone)]
pub struct PrinterClient {
    client: AsyncClient,
    request_topic: String,
    connected: Arc<AtomicBool>,
}

/// Receive half of the printer connection. Drive it with [`PrinterEvents::run`].
pub struct PrinterEvents {
    client: AsyncClient,
    event_loop: EventLoop,
    config: PrinterRuntimeConfig,
    status: Arc<SharedPrinterStatus>,
    connected: Arc<AtomicBool>,
}

impl PrinterClient {
    /// Create both halves. Nothing touches the network until the events half runs.
    pub fn new(
        config: PrinterRuntimeConfig,
        status: Arc<SharedPrinterStatus>,
    ) -> (Self, PrinterEvents) {
        let (client, event_loop) = AsyncClient::new(config.options(), 16);
        let connected = Arc::new(AtomicBool::new(false));

        let handle = Self {
            client: client.clone(),
            request_topic: config.request_topic(),
            connected: Arc::clone(&connected),
        };
        let events = PrinterEvents {
            client,
            event_loop,
            config,
            status,
            connected,
        };
        (handle, events)
    }
}

impl PrinterLink for PrinterClient {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        debug!("-> printer {}", command.encode());
        self.client
            .try_publish(
                self.request_topic.as_str(),
                QoS::AtMostOnce,
                false,
                command.encode(),
            )
            .map_err(|e| LinkError::Publish(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl PrinterEvents {
    /// Poll the connection forever, reconnecting after errors.
    pub async fn run(mut self) {
        let report_topic = self.config.report_topic();
        info!(
            "printer client connecting to {}:{}",
            self.config.host, self.config.port
        );

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("printer connected, subscribing to {}", report_topic);
                    self.connected.store(true, Ordering::Release);
                    if let Err(e) = self
                        .client
                        .try_subscribe(report_topic.as_str(), QoS::AtMostOnce)
                    {
                        warn!("printer subscribe failed: {}", e);
                    }
                    // Ask for a full report so status is populated immediately
                    let _ = self.client.try_publish(
                        self.config.request_topic(),
                        QoS::AtMostOnce,
                        false,
                        PrinterCommand::PushAll.encode(),
                    );
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == report_topic {
                        self.status.apply_report(&publish.payload);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::Release);
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::AcqRel) {
                        warn!("printer connection lost: {}", e);
                    } else {
                        debug!("printer connection error: {}", e);
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.reconnect_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PrinterRuntimeConfig {
        PrinterRuntimeConfig::from_config(
            &PrinterConfig::default()
                .with_host("192.168.1.50")
                .with_serial("01P00A123")
                .with_access_code("12345678"),
        )
    }

    #[test]
    fn runtime_config_copies_shared_config() {
        let config = config();
        assert_eq!(config.host, "192.168.1.50");
        assert_eq!(config.port, 8883);
        assert_eq!(config.username, "bblp");
        assert_eq!(config.access_code, "12345678");
        assert_eq!(config.report_topic(), "device/01P00A123/report");
        assert_eq!(config.request_topic(), "device/01P00A123/request");
    }

    #[test]
    fn send_before_connack_is_not_connected() {
        let (client, _events) = PrinterClient::new(config(), Arc::new(SharedPrinterStatus::new()));
        assert!(!client.is_connected());
        assert_eq!(
            client.send(&PrinterCommand::Pause),
            Err(LinkError::NotConnected)
        );
    }
}
