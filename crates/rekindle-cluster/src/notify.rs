use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rekindle_domain::Severity;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ClusterError;

/// Out-of-band escalation message sent when a recovery needs a human.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPayload {
    pub title: String,
    pub resource: String,
    pub pattern: String,
    pub severity: Severity,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), ClusterError>;
}

/// Posts escalation payloads as JSON to a webhook endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), ClusterError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ClusterError::Notification(e.to_string()))?;

        if response.status().is_success() {
            info!(resource = %payload.resource, "escalation webhook delivered");
            Ok(())
        } else {
            warn!(
                status = %response.status(),
                resource = %payload.resource,
                "escalation webhook rejected"
            );
            Err(ClusterError::Notification(format!(
                "webhook returned {}",
                response.status()
            )))
        }
    }
}

/// Fallback sink used when no webhook is configured: escalations land in the
/// log at warn level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), ClusterError> {
        warn!(
            resource = %payload.resource,
            pattern = %payload.pattern,
            severity = %payload.severity,
            reason = %payload.reason,
            "manual intervention required"
        );
        Ok(())
    }
}

/// Records payloads in memory; the sink the test suite asserts against.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    payloads: Arc<Mutex<Vec<EscalationPayload>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn payloads(&self) -> Vec<EscalationPayload> {
        self.payloads.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, payload: &EscalationPayload) -> Result<(), ClusterError> {
        self.payloads.lock().await.push(payload.clone());
        Ok(())
    }
}
