//! Axum-based control server.
//!
//! Provides:
//! - GET `/ws` - WebSocket control channel, one JSON request per message
//! - POST `/api/command` - Same control protocol over plain HTTP
//! - GET `/api/status` - Printer telemetry and registry summary
//! - GET `/api/filaments` - All registered filaments

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::config::WebConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::traits::{DeviceControl, KvStore, PrinterLink};
use crate::RegistryAccess;

use super::api::{ApiResponse, FilamentResponse, StatusResponse};
use super::shared::{SharedPrinterStatus, SharedRegistry};

/// Delay between an HTTP reply and its post action.
const POST_ACTION_DELAY: Duration = Duration::from_millis(200);

// ============================================================================
// App State
// ============================================================================

/// Everything the route handlers need.
pub struct AppState<S: KvStore, D, P> {
    /// Control-protocol dispatcher over the shared registry
    pub dispatcher: Dispatcher<Arc<SharedRegistry<S>>, D, P>,
    /// Printer telemetry
    pub status: Arc<SharedPrinterStatus>,
}

impl<S, D, P> AppState<S, D, P>
where
    S: KvStore,
    D: DeviceControl,
    P: PrinterLink,
{
    /// Build state around the shared registry and status.
    pub fn new(
        registry: Arc<SharedRegistry<S>>,
        status: Arc<SharedPrinterStatus>,
        device: D,
        printer: P,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry, device, printer),
            status,
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /ws - Upgrade to the control WebSocket
fn ws_upgrade<S, D, P>(
    ws: WebSocketUpgrade,
    state: Arc<AppState<S, D, P>>,
    max_frame_len: usize,
) -> impl IntoResponse
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    ws.max_message_size(max_frame_len)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<S, D, P>(mut socket: WebSocket, state: Arc<AppState<S, D, P>>)
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    debug!("control socket opened");
    while let Some(message) = socket.recv().await {
        let payload = match message {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("control socket error: {}", e);
                break;
            }
        };

        let outcome = dispatch_blocking(&state, payload).await;
        if socket.send(Message::Text(outcome.response)).await.is_err() {
            break;
        }
        state.dispatcher.run_post_action(outcome.after);
    }
    debug!("control socket closed");
}

/// Run one request on the blocking pool; registry saves write to storage.
async fn dispatch_blocking<S, D, P>(
    state: &Arc<AppState<S, D, P>>,
    payload: impl AsRef<[u8]> + Send + 'static,
) -> DispatchOutcome
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || state.dispatcher.dispatch(payload.as_ref())).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("dispatch task failed: {}", e);
            DispatchOutcome {
                response: json!({ "error": "Internal error" }).to_string(),
                after: None,
            }
        }
    }
}

/// POST /api/command - One control request over HTTP
async fn command<S, D, P>(
    State(state): State<Arc<AppState<S, D, P>>>,
    body: Bytes,
) -> impl IntoResponse
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let outcome = dispatch_blocking(&state, body).await;
    if outcome.after.is_some() {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            // Let the response flush before restarting
            tokio::time::sleep(POST_ACTION_DELAY).await;
            state.dispatcher.run_post_action(outcome.after);
        });
    }
    ([(header::CONTENT_TYPE, "application/json")], outcome.response)
}

/// GET /api/status - Printer telemetry and registry summary
async fn get_status<S, D, P>(
    State(state): State<Arc<AppState<S, D, P>>>,
) -> Json<ApiResponse<StatusResponse>>
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let filament_count = state.dispatcher.registry().with_registry(|r| r.len());
    Json(ApiResponse::ok(StatusResponse {
        printer: state.status.snapshot(),
        printer_connected: state.dispatcher.printer().is_connected(),
        filament_count,
    }))
}

/// GET /api/filaments - All registered filaments
async fn get_filaments<S, D, P>(
    State(state): State<Arc<AppState<S, D, P>>>,
) -> Json<ApiResponse<Vec<FilamentResponse>>>
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let records = state.dispatcher.registry().records();
    Json(ApiResponse::ok(
        records.iter().map(FilamentResponse::from).collect(),
    ))
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// WebSocket endpoint path
    pub ws_path: String,
    /// Largest accepted WebSocket message
    pub max_frame_len: usize,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self::from_config(&WebConfig::default())
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Create from shared WebConfig
    pub fn from_config(config: &WebConfig) -> Self {
        Self {
            addr: ([0, 0, 0, 0], config.port).into(),
            ws_path: config.ws_path.as_str().to_string(),
            max_frame_len: config.max_frame_len,
            cors_permissive: config.cors_permissive,
        }
    }
}

/// Build the Axum router with all routes
pub fn build_router<S, D, P>(state: Arc<AppState<S, D, P>>, config: &WebServerConfig) -> Router
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let max_frame_len = config.max_frame_len;

    let mut router = Router::new()
        .route(
            &config.ws_path,
            get(
                move |ws: WebSocketUpgrade, State(state): State<Arc<AppState<S, D, P>>>| async move {
                    ws_upgrade(ws, state, max_frame_len)
                },
            ),
        )
        .route("/api/command", post(command::<S, D, P>))
        .route("/api/status", get(get_status::<S, D, P>))
        .route("/api/filaments", get(get_filaments::<S, D, P>))
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Start the web server with shared state
///
/// This function blocks until the server is shut down.
pub async fn run_server<S, D, P>(
    state: Arc<AppState<S, D, P>>,
    config: WebServerConfig,
) -> Result<(), std::io::Error>
where
    S: KvStore + Send + 'static,
    D: DeviceControl + Send + Sync + 'static,
    P: PrinterLink + Send + Sync + 'static,
{
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        "control server listening on http://{} (socket at {})",
        config.addr, config.ws_path
    );

    axum::serve(listener, router).await
}
