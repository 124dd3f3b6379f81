//! Printer MQTT client for ESP32-C3.
//!
//! Connects to the printer's broker over TLS (`mqtts://<ip>:8883`, user
//! `bblp`, the LAN access code as password), subscribes to the report
//! topic and merges every report into the shared printer status.
//! Implements [`PrinterLink`] for commands going the other way.
//!
//! # Example
//!
//! ```ignore
//! use top_ams::hal::esp32::Esp32PrinterMqtt;
//!
//! let status = Arc::new(SharedPrinterStatus::new());
//! let printer = Esp32PrinterMqtt::new(&config.printer, Arc::clone(&status))?;
//! printer.send(&PrinterCommand::PushAll)?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::commands::PrinterCommand;
use crate::config::{LongString, PrinterConfig};
use crate::services::SharedPrinterStatus;
use crate::traits::{LinkError, PrinterLink};

/// Largest report the client reassembles. Full pushes run to tens of KiB.
const MAX_REPORT_LEN: usize = 64 * 1024;

/// Stack for the connection thread; report parsing runs on it.
const EVENT_STACK_SIZE: usize = 8 * 1024;

/// Printer connection over esp-idf's MQTT client.
pub struct Esp32PrinterMqtt {
    client: Arc<Mutex<EspMqttClient<'static>>>,
    request_topic: LongString,
    connected: Arc<AtomicBool>,
}

impl Esp32PrinterMqtt {
    /// Start the client and its connection thread.
    ///
    /// Returns as soon as the client is started; the connection completes
    /// in the background and reconnects on its own.
    pub fn new(config: &PrinterConfig, status: Arc<SharedPrinterStatus>) -> anyhow::Result<Self> {
        let broker_url = config.broker_url();
        let mqtt_config = MqttClientConfiguration {
            client_id: Some(config.client_id.as_str()),
            username: Some(config.username.as_str()),
            password: Some(config.access_code.as_str()),
            keep_alive_interval: Some(Duration::from_secs(config.keep_alive_secs as u64)),
            reconnect_timeout: Some(Duration::from_millis(config.reconnect_ms as u64)),
            // Printers present self-signed certificates
            skip_cert_common_name_check: true,
            buffer_size: 4096,
            out_buffer_size: 2048,
            ..Default::default()
        };

        let (client, connection) = EspMqttClient::new(broker_url.as_str(), &mqtt_config)?;
        let client = Arc::new(Mutex::new(client));
        let connected = Arc::new(AtomicBool::new(false));

        let events = EventContext {
            client: Arc::clone(&client),
            connected: Arc::clone(&connected),
            status,
            report_topic: config.report_topic(),
            request_topic: config.request_topic(),
        };
        thread::Builder::new()
            .name("printer-mqtt".into())
            .stack_size(EVENT_STACK_SIZE)
            .spawn(move || events.run(connection))?;

        info!("printer client started for {}", broker_url);
        Ok(Self {
            client,
            request_topic: config.request_topic(),
            connected,
        })
    }
}

impl PrinterLink for Esp32PrinterMqtt {
    fn send(&self, command: &PrinterCommand) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let payload = command.encode();
        debug!("-> printer {}", payload);
        let mut client = self.client.lock().unwrap_or_else(|e| e.into_inner());
        client
            .publish(
                self.request_topic.as_str(),
                QoS::AtLeastOnce,
                false,
                payload.as_bytes(),
            )
            .map(|_| ())
            .map_err(|e| LinkError::Publish(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ============================================================================
// Connection Thread
// ============================================================================

struct EventContext {
    client: Arc<Mutex<EspMqttClient<'static>>>,
    connected: Arc<AtomicBool>,
    status: Arc<SharedPrinterStatus>,
    report_topic: LongString,
    request_topic: LongString,
}

impl EventContext {
    fn run(self, mut connection: EspMqttConnection) {
        // Reports larger than the receive buffer arrive in chunks
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let event = match connection.next() {
                Ok(event) => event,
                Err(e) => {
                    warn!("printer connection closed: {:?}", e);
                    self.connected.store(false, Ordering::Release);
                    return;
                }
            };

            let mut just_connected = false;
            match event.payload() {
                EventPayload::Connected(_) => {
                    info!("printer connected");
                    self.connected.store(true, Ordering::Release);
                    just_connected = true;
                }
                EventPayload::Disconnected => {
                    warn!("printer disconnected");
                    self.connected.store(false, Ordering::Release);
                    pending.clear();
                }
                EventPayload::Received { data, details, .. } => match details {
                    Details::Complete => {
                        self.status.apply_report(data);
                    }
                    Details::InitialChunk(chunk) => {
                        pending.clear();
                        if chunk.total_data_size <= MAX_REPORT_LEN {
                            pending.reserve(chunk.total_data_size);
                            pending.extend_from_slice(data);
                        } else {
                            debug!("skipping {} byte report", chunk.total_data_size);
                        }
                    }
                    Details::SubsequentChunk(chunk) => {
                        if pending.is_empty() {
                            continue;
                        }
                        pending.extend_from_slice(data);
                        if pending.len() >= chunk.total_data_size {
                            self.status.apply_report(&pending);
                            pending.clear();
                        }
                    }
                },
                EventPayload::Error(e) => debug!("printer mqtt error: {:?}", e),
                _ => {}
            }

            // The client blocks while an event is outstanding
            drop(event);
            if just_connected {
                self.on_connected();
            }
        }
    }

    fn on_connected(&self) {
        let mut client = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = client.subscribe(self.report_topic.as_str(), QoS::AtMostOnce) {
            warn!("printer subscribe failed: {}", e);
            return;
        }
        // Ask for a full report so status is populated immediately
        let push_all = PrinterCommand::PushAll.encode();
        if let Err(e) = client.publish(
            self.request_topic.as_str(),
            QoS::AtLeastOnce,
            false,
            push_all.as_bytes(),
        ) {
            warn!("printer push_all failed: {}", e);
        }
    }
}
