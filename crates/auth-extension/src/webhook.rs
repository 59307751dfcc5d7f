use auth_core::audit::{AuditEvent, AuditLogger};
use auth_core::resilience::{retry, RetryConfig};
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info};

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub async fn dispatch(&self, url: &str, event: &str, payload: Value) -> Result<(), reqwest::Error> {
        info!("dispatching webhook: {} -> {}", event, url);

        let body = serde_json::json!({
            "event": event,
            "timestamp": chrono::Utc::now(),
            "payload": payload,
        });

        // Test/demo URLs are prefixed with "mock" to avoid live network calls.
        if !url.starts_with("mock") {
            let client = &self.client;
            retry(RetryConfig::default(), || async {
                client.post(url).json(&body).send().await?.error_for_status()
            })
            .await?;
        }

        Ok(())
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// `AuditLogger` adapter that forwards a subset of audit events to a
/// configured webhook endpoint: the `publish()` transport for
/// `token.access.introspected` and ReBAC write events (spec.md §6, §4.8).
pub struct WebhookAuditLogger {
    dispatcher: WebhookDispatcher,
    url: String,
}

impl WebhookAuditLogger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            dispatcher: WebhookDispatcher::new(),
            url: url.into(),
        }
    }

    fn is_published(action: &str) -> bool {
        matches!(
            action,
            "token.access.introspected" | "rebac.write.grant" | "rebac.write.revoke"
        )
    }
}

#[async_trait::async_trait]
impl AuditLogger for WebhookAuditLogger {
    async fn log(&self, event: AuditEvent) {
        if !Self::is_published(&event.action) {
            return;
        }

        let action = event.action.clone();
        let payload = serde_json::to_value(&event).unwrap_or_default();

        // Fire-and-forget: publish failures never affect the request that
        // produced the event (spec.md §17, "Event publication").
        if let Err(e) = self.dispatcher.dispatch(&self.url, &action, payload).await {
            error!("webhook audit dispatch failed for {}: {}", action, e);
        }
    }
}
