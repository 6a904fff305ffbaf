//! ==============================================================================
//! server.rs - web boundary
//! ==============================================================================
//!
//! routes:
//!
//! | method | path            | purpose                                        |
//! |--------|-----------------|------------------------------------------------|
//! | POST   | /temperature    | partial settings update (authorized)           |
//! | POST   | /api/config     | same as /temperature                           |
//! | GET    | /api/config     | current persisted settings                     |
//! | GET    | /chart/:day     | all records of one YYYY-MM-DD day, [] if none  |
//! | GET    | /ws             | websocket, one {"event":"status"} frame a tick |
//! | GET    | /_health        | liveness                                       |
//!
//! relationships:
//!     - uses: settings.rs (read/update), history.rs (read_day), live.rs (subscribe)
//!     - uses: auth.rs (control endpoint)
//!     - started by: main.rs
//!
//! ==============================================================================

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::auth::Authorizer;
use crate::domain::{Configuration, PartialConfiguration, StatusRecord};
use crate::error::{FridgeError, Result};
use crate::history::HistoryReader;
use crate::live::LiveChannel;
use crate::settings::ConfigStore;

// ==============================================================================
// shared state
// ==============================================================================
// every handler gets a clone; the fields are cheap handles, the real
// state lives on disk (settings, day logs) or in the broadcast channel.

#[derive(Clone)]
pub struct AppState {
    pub settings: ConfigStore,
    pub history: HistoryReader,
    pub live: LiveChannel,
    pub auth: Arc<dyn Authorizer>,
    /// reject control updates that leave out any of the four settings
    pub require_all_fields: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/temperature", post(update_settings))
        .route("/api/config", get(current_settings).post(update_settings))
        .route("/chart/:day", get(chart))
        .route("/ws", get(live_stream))
        .route("/_health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// serve until `shutdown` resolves, then drain in-flight requests
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "web server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

// ==============================================================================
// error mapping
// ==============================================================================

impl IntoResponse for FridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            FridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            FridgeError::Validation(_) => StatusCode::BAD_REQUEST,
            FridgeError::Unauthorized => StatusCode::UNAUTHORIZED,
            FridgeError::SensorFault(_) => StatusCode::SERVICE_UNAVAILABLE,
            FridgeError::CorruptData { .. } | FridgeError::Task(_) | FridgeError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FridgeError::Task(e.to_string()))?
}

// ==============================================================================
// handlers
// ==============================================================================

/// overlay the supplied settings onto the stored ones
///
/// the body is only parsed once the caller is authorized.
async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = state.auth.authorize(authorization) {
        warn!("rejected settings update: not authorized");
        return Err(e);
    }

    let partial: PartialConfiguration = serde_json::from_slice(&body)
        .map_err(|e| FridgeError::Validation(format!("bad settings payload: {e}")))?;

    if state.require_all_fields {
        let missing = partial.missing_fields();
        if !missing.is_empty() {
            return Err(FridgeError::Validation(format!("missing field(s): {}", missing.join(", "))));
        }
    }
    let non_finite = partial.non_finite_fields();
    if !non_finite.is_empty() {
        return Err(FridgeError::Validation(format!("not a finite number: {}", non_finite.join(", "))));
    }

    let settings = state.settings.clone();
    let merged = blocking(move || settings.update(&partial)).await?;
    info!(?merged, "updated settings");
    Ok("OK")
}

async fn current_settings(State(state): State<AppState>) -> Result<Json<Configuration>> {
    let settings = state.settings.clone();
    blocking(move || settings.read()).await.map(Json)
}

async fn chart(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> Result<Json<Vec<StatusRecord>>> {
    let day = HistoryReader::parse_day(&day)?;
    let history = state.history.clone();
    blocking(move || history.read_day_or_empty(day)).await.map(Json)
}

async fn health() -> &'static str {
    "OK"
}

// ==============================================================================
// live stream
// ==============================================================================

#[derive(Serialize)]
struct LiveFrame<'a> {
    event: &'static str,
    data: &'a StatusRecord,
}

/// `{"event":"status","data":{...}}`, the text frame sent per sample
fn status_frame(record: &StatusRecord) -> serde_json::Result<String> {
    serde_json::to_string(&LiveFrame { event: "status", data: record })
}

async fn live_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let live = state.live.clone();
    ws.on_upgrade(move |socket| stream_status(socket, live))
}

async fn stream_status(mut socket: WebSocket, live: LiveChannel) {
    let mut rx = live.subscribe();
    debug!(subscribers = live.subscriber_count(), "live subscriber connected");

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(record) => {
                    let frame = match status_frame(&record) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "could not encode status frame");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "live subscriber lagging, skipping ahead");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("live subscriber disconnected");
}
