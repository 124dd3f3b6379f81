//! WebSocket control server for ESP32-C3.
//!
//! Serves the control protocol on one WebSocket endpoint of the built-in
//! HTTP server. Each text frame is one request; the response goes back on
//! the same connection before any post action runs.
//!
//! # Example
//!
//! ```ignore
//! use top_ams::hal::esp32::Esp32WsServer;
//!
//! let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry), device, printer));
//! let _server = Esp32WsServer::new(&config.web, dispatcher)?;
//! ```

use std::sync::Arc;

use esp_idf_svc::http::server::ws::EspHttpWsConnection;
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::ws::FrameType;
use esp_idf_sys::{EspError, ESP_ERR_INVALID_SIZE};
use log::{debug, info, warn};

use crate::config::WebConfig;
use crate::dispatch::{oversized_frame, Dispatcher};
use crate::registry::RegistryAccess;
use crate::traits::{DeviceControl, PrinterLink};

/// Handler task stack. JSON parsing and NVS writes run on it.
const HANDLER_STACK_SIZE: usize = 10 * 1024;

/// Running control socket server. Dropping it stops the server.
pub struct Esp32WsServer {
    _server: EspHttpServer<'static>,
}

impl Esp32WsServer {
    /// Start the HTTP server and register the control socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to start or the handler
    /// cannot be registered.
    pub fn new<R, D, P>(
        config: &WebConfig,
        dispatcher: Arc<Dispatcher<R, D, P>>,
    ) -> anyhow::Result<Self>
    where
        R: RegistryAccess + Send + Sync + 'static,
        D: DeviceControl + Send + Sync + 'static,
        P: PrinterLink + Send + Sync + 'static,
    {
        let server_config = Configuration {
            http_port: config.port,
            stack_size: HANDLER_STACK_SIZE,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&server_config)?;

        let max_frame_len = config.max_frame_len;
        server.ws_handler(
            config.ws_path.as_str(),
            move |ws: &mut EspHttpWsConnection| -> Result<(), EspError> {
                handle_frame(ws, &dispatcher, max_frame_len)
            },
        )?;

        info!(
            "control server listening on port {} (socket at {})",
            config.port, config.ws_path
        );
        Ok(Self { _server: server })
    }
}

fn handle_frame<R, D, P>(
    ws: &mut EspHttpWsConnection,
    dispatcher: &Dispatcher<R, D, P>,
    max_frame_len: usize,
) -> Result<(), EspError>
where
    R: RegistryAccess,
    D: DeviceControl,
    P: PrinterLink,
{
    if ws.is_new() {
        debug!("control socket {} opened", ws.session());
        return Ok(());
    }
    if ws.is_closed() {
        debug!("control socket {} closed", ws.session());
        return Ok(());
    }

    // Zero-length read reports the frame type and size
    let (frame_type, len) = ws.recv(&mut [])?;
    match frame_type {
        FrameType::Text(_) | FrameType::Binary(_) => {}
        _ => return Ok(()),
    }
    // The payload cannot be read in pieces, so an oversized frame is never
    // read at all: reply, then fail the handler to close the session.
    if let Some(reply) = oversized_frame(len, max_frame_len) {
        warn!("closing socket {} after a {} byte frame", ws.session(), len);
        ws.send(FrameType::Text(false), reply.response.as_bytes())?;
        return Err(EspError::from_infallible::<ESP_ERR_INVALID_SIZE>());
    }

    let mut buf = vec![0u8; len];
    ws.recv(&mut buf)?;
    // Text frames arrive NUL-terminated
    while buf.last() == Some(&0) {
        buf.pop();
    }

    let outcome = dispatcher.dispatch(&buf);
    ws.send(FrameType::Text(false), outcome.response.as_bytes())?;
    dispatcher.run_post_action(outcome.after);
    Ok(())
}
