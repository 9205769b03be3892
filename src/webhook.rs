//! Webhook queue and dispatcher (§4.9): persist `{endpoint, secret, payload}`
//! tuples and deliver them with an HMAC-signed body, retrying on non-2xx or
//! network failure until the subscriber's retry budget is exhausted.

use crate::retry::backoff_delay_ms;
use crate::types::{QueuedWebhook, RetryConfig, WebhookConfig, WebhookPayload};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;
use std::sync::Mutex;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Computes `HMAC-SHA256(secret, body)`, hex-encoded.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a `X-Webhook-Signature` header value against `body`, in constant time.
///
/// Accepts either `"sha256=<hex>"` or a bare 64-char hex string.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let hex_part = header_value.strip_prefix("sha256=").unwrap_or(header_value);
    let provided = match hex::decode(hex_part) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    expected.ct_eq(&provided).into()
}

/// Persistence + scheduling for pending webhook deliveries.
#[async_trait]
pub trait WebhookQueue: Send + Sync {
    /// Adds a new entry, due for immediate delivery.
    async fn enqueue(&self, config: WebhookConfig, payload: WebhookPayload) -> crate::errors::Result<String>;

    /// Pops the next entry whose `next_attempt <= now_ms`, if any.
    async fn dequeue(&self, now_ms: i64) -> crate::errors::Result<Option<QueuedWebhook>>;

    /// Reschedules `entry` after a failed delivery, recording `error_msg` and
    /// bumping `attempts`. Drops the entry (dead-letters) once `max_attempts`
    /// is exceeded.
    async fn retry(&self, entry: QueuedWebhook, error_msg: &str) -> crate::errors::Result<()>;

    /// Removes an entry outright (successful delivery, or dead-letter).
    async fn remove(&self, id: &str) -> crate::errors::Result<()>;

    /// Number of entries currently queued.
    async fn size(&self) -> crate::errors::Result<usize>;

    /// Signals the dispatcher loop to stop after its current iteration.
    async fn close(&self) -> crate::errors::Result<()>;

    /// Whether [`WebhookQueue::close`] has been called.
    async fn is_closed(&self) -> crate::errors::Result<bool>;
}

/// In-memory [`WebhookQueue`]: a map scanned lazily for due entries.
#[derive(Default)]
pub struct InMemoryWebhookQueue {
    entries: Mutex<Vec<QueuedWebhook>>,
    closed: Mutex<bool>,
}

impl InMemoryWebhookQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookQueue for InMemoryWebhookQueue {
    async fn enqueue(&self, config: WebhookConfig, payload: WebhookPayload) -> crate::errors::Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let entry = QueuedWebhook {
            id: id.clone(),
            config,
            payload,
            attempts: 0,
            next_attempt: now,
            last_error: None,
            created_at: now,
        };
        self.entries.lock().unwrap().push(entry);
        Ok(id)
    }

    async fn dequeue(&self, now_ms: i64) -> crate::errors::Result<Option<QueuedWebhook>> {
        let mut entries = self.entries.lock().unwrap();
        let position = entries.iter().position(|e| e.next_attempt <= now_ms);
        Ok(position.map(|i| entries.remove(i)))
    }

    async fn retry(&self, mut entry: QueuedWebhook, error_msg: &str) -> crate::errors::Result<()> {
        let retry_index = entry.attempts;
        entry.attempts += 1;
        entry.last_error = Some(error_msg.to_string());
        if entry.attempts >= entry.config.retry.max_attempts {
            warn!(id = %entry.id, url = %entry.config.url, attempts = entry.attempts, "webhook dead-lettered after exhausting retries");
            return Ok(());
        }
        let delay_ms = backoff_delay_ms(
            entry.config.retry.backoff,
            entry.config.retry.initial_delay_ms,
            entry.config.retry.max_delay_ms,
            retry_index,
        );
        entry.next_attempt = chrono::Utc::now().timestamp_millis() + delay_ms as i64;
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn remove(&self, id: &str) -> crate::errors::Result<()> {
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn size(&self) -> crate::errors::Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }

    async fn close(&self) -> crate::errors::Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }

    async fn is_closed(&self) -> crate::errors::Result<bool> {
        Ok(*self.closed.lock().unwrap())
    }
}

/// How a delivery attempt's HTTP result should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryOutcome {
    Success,
    Permanent,
    Retryable,
}

fn classify_status(status: StatusCode) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Success
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryOutcome::Retryable
    } else {
        DeliveryOutcome::Permanent
    }
}

/// Single cooperative delivery loop per process (§4.9).
pub struct WebhookDispatcher<Q: WebhookQueue> {
    queue: std::sync::Arc<Q>,
    http_client: reqwest::Client,
}

const POST_TIMEOUT: Duration = Duration::from_secs(10);
/// Sleep between empty-queue polls, so the loop doesn't busy-spin.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

impl<Q: WebhookQueue + 'static> WebhookDispatcher<Q> {
    /// Builds a dispatcher over an injected queue.
    pub fn new(queue: std::sync::Arc<Q>) -> Self {
        WebhookDispatcher {
            queue,
            http_client: reqwest::Client::new(),
        }
    }

    /// Runs the delivery loop until the queue reports closed. Intended to be
    /// spawned as its own task.
    pub async fn run(&self) {
        loop {
            if matches!(self.queue.is_closed().await, Ok(true)) {
                return;
            }
            let now = chrono::Utc::now().timestamp_millis();
            match self.queue.dequeue(now).await {
                Ok(Some(entry)) => self.deliver_one(entry).await,
                Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    warn!(error = %e, "webhook queue dequeue failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Attempts delivery of one entry and applies the result's classification.
    pub async fn deliver_one(&self, entry: QueuedWebhook) {
        let body = match serde_json::to_vec(&entry.payload) {
            Ok(b) => b,
            Err(e) => {
                warn!(id = %entry.id, error = %e, "failed to serialize webhook payload, dropping");
                let _ = self.queue.remove(&entry.id).await;
                return;
            }
        };
        let signature = sign_payload(&entry.config.secret, &body);
        let now_ms = chrono::Utc::now().timestamp_millis();

        let result = self
            .http_client
            .post(&entry.config.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", format!("sha256={signature}"))
            .header("X-Webhook-Timestamp", now_ms.to_string())
            .timeout(POST_TIMEOUT)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) => match classify_status(response.status()) {
                DeliveryOutcome::Success => {
                    debug!(id = %entry.id, url = %entry.config.url, "webhook delivered");
                    let _ = self.queue.remove(&entry.id).await;
                }
                DeliveryOutcome::Permanent => {
                    warn!(id = %entry.id, url = %entry.config.url, status = %response.status(), "webhook permanently rejected, dead-lettering");
                    let _ = self.queue.remove(&entry.id).await;
                }
                DeliveryOutcome::Retryable => {
                    let status = response.status();
                    if let Err(e) = self.queue.retry(entry, &format!("HTTP {status}")).await {
                        warn!(error = %e, "failed to reschedule webhook retry");
                    }
                }
            },
            Err(e) => {
                if let Err(queue_err) = self.queue.retry(entry, &e.to_string()).await {
                    warn!(error = %queue_err, "failed to reschedule webhook retry after network error");
                }
            }
        }
    }
}

/// Enqueues a webhook notification for every configured subscriber.
pub async fn notify_all<Q: WebhookQueue>(
    queue: &Q,
    subscribers: &[WebhookConfig],
    payload: WebhookPayload,
) -> crate::errors::Result<()> {
    for config in subscribers {
        let id = queue.enqueue(config.clone(), payload.clone()).await?;
        info!(id = %id, url = %config.url, "webhook enqueued");
    }
    Ok(())
}
