//! Delivery of normalized records to the remote collector.
//!
//! [`GatewayClient`] performs one HTTP POST per record. [`Dispatcher`] puts a
//! bounded queue and a fixed pool of worker tasks in front of it so the
//! router can submit records without waiting on the network. Delivery is
//! best effort: failures are logged and counted, never retried.

use crate::config::Config;
use crate::core::record::NormalizedRecord;
use crate::core::sink::{RecordSink, SinkError};
use crate::transparency::SharedTransparencyLog;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Content type of every delivery.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Collector endpoint URL
    pub endpoint: String,
    /// Optional bearer token
    pub token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from the monitor configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// Gateway client error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway config error: {0}")]
    Config(String),
    #[error("Gateway network error: {0}")]
    Network(String),
    #[error("Gateway server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Gateway serialization error: {0}")]
    Serialization(String),
}

/// Status and body of an accepted delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub status: u16,
    pub body: String,
}

/// HTTP client for the collector endpoint.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// POST one record. A non-2xx status is reported as [`GatewayError::Server`].
    pub async fn deliver(&self, record: &NormalizedRecord) -> Result<DeliveryReceipt, GatewayError> {
        let body =
            serde_json::to_vec(record).map_err(|e| GatewayError::Serialization(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "empty".to_string());

        if !status.is_success() {
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(DeliveryReceipt {
            status: status.as_u16(),
            body,
        })
    }
}

/// Bounded worker pool delivering records in the background.
pub struct Dispatcher {
    sender: mpsc::Sender<NormalizedRecord>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn `workers` delivery tasks on `runtime`, fed by a queue of `capacity`.
    ///
    /// Must be called from outside the runtime or from within one of its tasks.
    pub fn spawn(
        runtime: &tokio::runtime::Handle,
        client: GatewayClient,
        workers: usize,
        capacity: usize,
        log: SharedTransparencyLog,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let client = Arc::new(client);

        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let client = client.clone();
                let log = log.clone();
                runtime.spawn(run_worker(id, receiver, client, log))
            })
            .collect();

        info!(endpoint = client.endpoint(), "Delivery workers started");
        Self { sender, workers }
    }

    /// Close the queue and wait for workers to finish what is queued.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Delivery worker panicked: {e}");
            }
        }
    }

    /// Records waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

impl RecordSink for Dispatcher {
    fn submit(&self, record: NormalizedRecord) -> Result<(), SinkError> {
        self.sender.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Delivery queue full, dropping record");
                SinkError::Full
            }
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<NormalizedRecord>>>,
    client: Arc<GatewayClient>,
    log: SharedTransparencyLog,
) {
    loop {
        // Hold the lock only while waiting, not while delivering.
        let next = receiver.lock().await.recv().await;
        let Some(record) = next else {
            debug!(worker = id, "Delivery queue closed");
            break;
        };

        match client.deliver(&record).await {
            Ok(receipt) => {
                log.record_delivery_success();
                debug!(
                    worker = id,
                    status = receipt.status,
                    body = %receipt.body,
                    "Record delivered"
                );
            }
            Err(e) => {
                log.record_delivery_failure();
                error!(worker = id, app = %record.app_identifier, "Failed to deliver record: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::RawPayload;
    use crate::transparency::create_shared_log;

    fn record() -> NormalizedRecord {
        NormalizedRecord {
            app_name: "Chat".to_string(),
            app_identifier: "com.chat".to_string(),
            app_version: "1.0".to_string(),
            title: Some("Bob".to_string()),
            message: "hi".to_string(),
            message_type: "text".to_string(),
            delivered_at: None,
            is_outgoing: false,
            is_read: false,
            is_deleted: false,
            device_id: "dev".to_string(),
            device_name: "Pixel".to_string(),
            os_version: "14".to_string(),
            raw_payload: RawPayload::new(),
        }
    }

    #[test]
    fn test_gateway_config_from_config() {
        let mut config = Config::default();
        config.endpoint = "http://10.0.0.2:8000/api/notifications".to_string();
        config.token = Some("secret".to_string());

        let gateway = GatewayConfig::from_config(&config);
        assert_eq!(gateway.endpoint, "http://10.0.0.2:8000/api/notifications");
        assert_eq!(gateway.token.as_deref(), Some("secret"));
        assert_eq!(gateway.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_counted_not_fatal() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = GatewayClient::new(
            GatewayConfig::new("http://127.0.0.1:9/api/notifications")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let log = create_shared_log();
        let dispatcher = Dispatcher::spawn(
            &tokio::runtime::Handle::current(),
            client,
            2,
            8,
            log.clone(),
        );

        dispatcher.submit(record()).unwrap();
        dispatcher.submit(record()).unwrap();
        dispatcher.shutdown().await;

        let stats = log.stats();
        assert_eq!(stats.deliveries_failed, 2);
        assert_eq!(stats.deliveries_succeeded, 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        // No workers: nothing drains the queue.
        let (sender, _receiver) = mpsc::channel(1);
        let dispatcher = Dispatcher {
            sender,
            workers: Vec::new(),
        };

        assert_eq!(dispatcher.submit(record()), Ok(()));
        assert_eq!(dispatcher.queued(), 1);
        assert_eq!(dispatcher.submit(record()), Err(SinkError::Full));
    }
}
