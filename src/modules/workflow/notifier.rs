use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;

use crate::core::config::XrayConfig;
use crate::core::error::AppError;

pub const SIGNATURE_HEADER: &str = "X-Practice-Signature";
const EVENT_HEADER: &str = "X-Practice-Event";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub event: String,
    pub user_id: String,
    pub occurred_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl WorkflowEvent {
    pub fn new(event: &str, user_id: &str, data: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            user_id: user_id.to_string(),
            occurred_at: Utc::now(),
            data,
        }
    }
}

/// `sha256=<hex hmac>` over the raw body
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Posts events to the configured workflow webhook. A notifier without a
/// URL accepts and drops everything.
pub struct WorkflowNotifier {
    client: Client,
    webhook_url: Option<String>,
    secret: Option<String>,
}

impl WorkflowNotifier {
    pub fn new(config: &XrayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build webhook client: {}", e)))?;

        Ok(Self {
            client,
            webhook_url: config.workflow_webhook_url.clone(),
            secret: config.workflow_webhook_secret.clone(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            webhook_url: None,
            secret: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn notify(&self, event: &WorkflowEvent) -> Result<(), AppError> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let body = serde_json::to_vec(event)
            .map_err(|e| AppError::Internal(format!("Failed to serialize event: {}", e)))?;

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, &event.event);

        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Fire and forget; failures are only logged
    pub fn spawn_notify(self: &Arc<Self>, event: WorkflowEvent) {
        if !self.is_enabled() {
            return;
        }
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            match notifier.notify(&event).await {
                Ok(()) => tracing::debug!("Workflow event '{}' delivered", event.event),
                Err(e) => tracing::warn!("Workflow event '{}' not delivered: {}", event.event, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload_matches_known_hmac() {
        let signature =
            sign_payload("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            signature,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_a_no_op() {
        let notifier = WorkflowNotifier::disabled();
        assert!(!notifier.is_enabled());
        let event = WorkflowEvent::new("xray.uploaded", "user-1", serde_json::json!({}));
        tokio_test::assert_ok!(notifier.notify(&event).await);
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = WorkflowEvent::new(
            "xray.uploaded",
            "user-1",
            serde_json::json!({ "xrayId": "abc" }),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "xray.uploaded");
        assert_eq!(value["userId"], "user-1");
        assert!(value.get("occurredAt").is_some());
        assert_eq!(value["data"]["xrayId"], "abc");
    }
}
