//! Desktop control server for exercising the control protocol without hardware.
//!
//! Runs the same dispatcher as the firmware against directory-backed
//! storage, so you can:
//! - Drive `ws://localhost:8080/ws` with any WebSocket client
//! - POST requests to `http://localhost:8080/api/command`
//! - Watch `GET /api/status` and `GET /api/filaments`
//! - Optionally bridge to a real printer over MQTT
//!
//! # Usage
//!
//! Control server only:
//! ```sh
//! cargo run --example desktop_server --features web
//! ```
//!
//! Control server + printer:
//! ```sh
//! PRINTER_IP=192.168.1.50 PRINTER_SERIAL=01P00A... PRINTER_CODE=12345678 \
//!     cargo run --example desktop_server --features web,mqtt
//! ```
//!
//! # Configuration
//!
//! - `TOP_AMS_DATA`: storage directory (default `./top-ams-data`)
//! - `TOP_AMS_PORT`: listen port (default 8080)
//! - `RUST_LOG`: log filter (default `info`)
//!
//! Printer settings stored through the control socket take precedence
//! over the environment on the next start.

use std::sync::Arc;

use anyhow::Context;
use log::info;

use top_ams::hal::{FileDevice, FileStore};
use top_ams::services::{run_server, AppState, SharedPrinterStatus, SharedRegistry, WebServerConfig};
use top_ams::settings::describe;
use top_ams::traits::PrinterLink;
use top_ams::{Config, FilamentRegistry, PrinterConfig, WebConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = std::env::var("TOP_AMS_DATA").unwrap_or_else(|_| "top-ams-data".to_string());
    let port = match std::env::var("TOP_AMS_PORT") {
        Ok(port) => port.parse().context("TOP_AMS_PORT must be a port number")?,
        Err(_) => 8080,
    };

    // Central configuration - environment first, stored settings on top
    let env = |name: &str| std::env::var(name).unwrap_or_default();
    let defaults = Config::default()
        .with_web(WebConfig::default().with_port(port).with_cors(true))
        .with_printer(
            PrinterConfig::default()
                .with_host(&env("PRINTER_IP"))
                .with_serial(&env("PRINTER_SERIAL"))
                .with_access_code(&env("PRINTER_CODE")),
        );

    let device = FileDevice::new(
        FileStore::open(&data_dir)
            .with_context(|| format!("opening data directory {}", data_dir))?,
    );
    let config = device.stored_config(defaults);
    info!("settings: {}", describe(&config));

    let mut registry = FilamentRegistry::new(
        FileStore::open(&data_dir)?,
        config.registry.storage_key.as_str(),
    );
    registry.init();
    info!("{} filament(s) loaded from {}", registry.len(), data_dir);

    let registry = Arc::new(SharedRegistry::new(registry));
    let status = Arc::new(SharedPrinterStatus::new());

    #[cfg(feature = "mqtt")]
    let printer = {
        use top_ams::services::{PrinterClient, PrinterRuntimeConfig};

        if config.printer.is_configured() {
            let (client, events) = PrinterClient::new(
                PrinterRuntimeConfig::from_config(&config.printer),
                Arc::clone(&status),
            );
            tokio::spawn(events.run());
            Some(client)
        } else {
            info!("printer not configured (set PRINTER_IP, PRINTER_SERIAL, PRINTER_CODE)");
            None
        }
    };
    #[cfg(not(feature = "mqtt"))]
    let printer = top_ams::NoPrinter;

    serve(&config, registry, status, device, printer).await
}

async fn serve<P>(
    config: &Config,
    registry: Arc<SharedRegistry<FileStore>>,
    status: Arc<SharedPrinterStatus>,
    device: FileDevice,
    printer: P,
) -> anyhow::Result<()>
where
    P: PrinterLink + Send + Sync + 'static,
{
    let web_config = WebServerConfig::from_config(&config.web);
    info!("  Socket: ws://{}{}", web_config.addr, web_config.ws_path);
    info!("  Status: http://{}/api/status", web_config.addr);

    let state = Arc::new(AppState::new(Arc::clone(&registry), status, device, printer));
    run_server(state, web_config).await?;

    registry.save();
    Ok(())
}
