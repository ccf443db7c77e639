//! Collector HTTP server.
//!
//! The receiving end of the monitor's deliveries:
//! - Accepts normalized records via `POST /api/notifications`
//! - Validates them and keeps them in memory (optionally appending JSON lines)
//! - Lists what it stored via `GET /api/notifications`
//!
//! # Architecture
//!
//! ```text
//! notify-monitor ──→ POST /api/notifications ──→ collector ──→ [memory / .jsonl]
//! ```

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Message types the collector accepts.
pub const MESSAGE_TYPES: &[&str] = &[
    "text", "image", "video", "audio", "file", "link", "call", "sticker", "system",
];

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Append accepted records here as JSON lines
    pub store_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            store_path: None,
        }
    }

    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }
}

/// A record as submitted by a monitor. Everything except `app_name` is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingNotification {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub app_identifier: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub is_outgoing: Option<bool>,
    #[serde(default)]
    pub delivered_at: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub raw_payload: Option<Map<String, Value>>,
}

/// A validated, stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNotification {
    pub id: u64,
    pub app_name: String,
    pub app_identifier: Option<String>,
    pub app_version: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub message_type: String,
    pub is_read: bool,
    pub is_deleted: bool,
    pub is_outgoing: bool,
    pub delivered_at: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub raw_payload: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

/// Validation failure for an incoming record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl IncomingNotification {
    /// Validate the record. `message_type` defaults to `text`; the id stays 0
    /// until the record is stored.
    pub fn validate(self) -> Result<StoredNotification, ValidationError> {
        let app_name = self
            .app_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ValidationError {
                field: "app_name",
                message: "The app name field is required.".to_string(),
            })?;

        let message_type = match self.message_type.filter(|t| !t.is_empty()) {
            None => "text".to_string(),
            Some(t) if MESSAGE_TYPES.contains(&t.as_str()) => t,
            Some(t) => {
                return Err(ValidationError {
                    field: "message_type",
                    message: format!("The selected message type '{t}' is invalid."),
                })
            }
        };

        if let Some(ref delivered_at) = self.delivered_at {
            if chrono::NaiveDateTime::parse_from_str(delivered_at, "%Y-%m-%d %H:%M:%S").is_err()
                && DateTime::parse_from_rfc3339(delivered_at).is_err()
            {
                return Err(ValidationError {
                    field: "delivered_at",
                    message: format!("'{delivered_at}' is not a valid date."),
                });
            }
        }

        Ok(StoredNotification {
            id: 0,
            app_name,
            app_identifier: self.app_identifier,
            app_version: self.app_version,
            title: self.title,
            message: self.message,
            message_type,
            is_read: self.is_read.unwrap_or(false),
            is_deleted: self.is_deleted.unwrap_or(false),
            is_outgoing: self.is_outgoing.unwrap_or(false),
            delivered_at: self.delivered_at,
            device_id: self.device_id,
            device_name: self.device_name,
            os_version: self.os_version,
            raw_payload: self.raw_payload,
            created_at: Utc::now(),
        })
    }
}

/// Shared server state
pub struct ServerState {
    records: RwLock<Vec<StoredNotification>>,
    next_id: AtomicU64,
    store_path: Option<PathBuf>,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            store_path: config.store_path.clone(),
        }
    }

    fn append_to_store(&self, record: &StoredNotification) {
        let Some(ref path) = self.store_path else {
            return;
        };
        let result = serde_json::to_string(record)
            .map_err(std::io::Error::other)
            .and_then(|line| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                writeln!(file, "{line}")
            });
        if let Err(e) = result {
            tracing::warn!("Failed to append record to {}: {}", path.display(), e);
        }
    }
}

/// Response from the store endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StoreResponse {
    pub success: bool,
    pub data: StoredNotification,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/notifications
async fn store(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<IncomingNotification>, JsonRejection>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    let Json(incoming) = payload.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid JSON body: {e}"),
                code: "INVALID_BODY".to_string(),
            }),
        )
    })?;

    let mut stored = incoming.validate().map_err(|e| {
        tracing::debug!(field = e.field, "Rejected record: {}", e.message);
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: e.message,
                code: format!("INVALID_{}", e.field.to_uppercase()),
            }),
        )
    })?;
    stored.id = state.next_id.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        id = stored.id,
        app = %stored.app_name,
        outgoing = stored.is_outgoing,
        "Stored record"
    );
    state.append_to_store(&stored);
    state.records.write().await.push(stored.clone());

    Ok((
        StatusCode::CREATED,
        Json(StoreResponse {
            success: true,
            data: stored,
        }),
    ))
}

/// GET /api/notifications
async fn list(State(state): State<Arc<ServerState>>) -> Json<Vec<StoredNotification>> {
    Json(state.records.read().await.clone())
}

/// Build the router for `state`.
pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/notifications", get(list).post(store))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    let app = app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Collector listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(app_name: Option<&str>, message_type: Option<&str>) -> IncomingNotification {
        IncomingNotification {
            app_name: app_name.map(str::to_string),
            app_identifier: Some("com.chat".to_string()),
            app_version: None,
            title: None,
            message: Some("hi".to_string()),
            message_type: message_type.map(str::to_string),
            is_read: None,
            is_deleted: None,
            is_outgoing: Some(true),
            delivered_at: Some("2024-01-22 10:00:00".to_string()),
            device_id: None,
            device_name: None,
            os_version: None,
            raw_payload: None,
        }
    }

    #[test]
    fn test_message_type_defaults_to_text() {
        let stored = incoming(Some("Chat"), None).validate().unwrap();
        assert_eq!(stored.message_type, "text");
        assert!(stored.is_outgoing);
        assert!(!stored.is_read);
    }

    #[test]
    fn test_app_name_required() {
        let err = incoming(None, None).validate().unwrap_err();
        assert_eq!(err.field, "app_name");
        let err = incoming(Some("  "), None).validate().unwrap_err();
        assert_eq!(err.field, "app_name");
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let err = incoming(Some("Chat"), Some("msg")).validate().unwrap_err();
        assert_eq!(err.field, "message_type");
        assert!(incoming(Some("Chat"), Some("call")).validate().is_ok());
    }

    #[test]
    fn test_bad_date_rejected() {
        let mut record = incoming(Some("Chat"), None);
        record.delivered_at = Some("yesterday".to_string());
        assert_eq!(record.validate().unwrap_err().field, "delivered_at");
    }
}
