use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::sla::BreachAlert;

// ── Webhook Event Types ───────────────────────────────────────

/// A structured event payload sent to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// Event type identifier, e.g. "sla_breached".
    pub event_type: String,
    /// ISO-8601 timestamp of when the event was built.
    pub timestamp: String,
    pub approval_id: String,
    pub step_number: u32,
    /// Event-specific details (workflow type, due time, ...).
    pub details: serde_json::Value,
}

impl WebhookEvent {
    pub fn sla_breached(alert: &BreachAlert) -> Self {
        Self {
            event_type: "sla_breached".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            approval_id: alert.approval_id.clone(),
            step_number: alert.step_number,
            details: serde_json::json!({
                "workflow_type": alert.workflow_type,
                "due_time": alert.due_time.to_rfc3339(),
                "breached_at": alert.breached_at.to_rfc3339(),
            }),
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// HMAC-SHA256 of `payload` as `sha256=<lowercase hex>`.
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(bytes))
}

// ── Webhook Notifier ──────────────────────────────────────────

/// Delivers webhook events with optional HMAC signing
/// (`X-WFA-Signature`) and retry with back-off (1s → 5s → 25s).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    backoff_secs: Vec<u64>,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("workflow-analytics-webhook/1.0")
            .build()?;
        Ok(Self {
            client,
            backoff_secs: vec![0, 1, 5, 25],
        })
    }

    /// Replace the retry schedule. The first entry is the delay before the
    /// first attempt.
    pub fn with_backoff(mut self, backoff_secs: Vec<u64>) -> Self {
        self.backoff_secs = backoff_secs;
        self
    }

    /// Send one event to one URL, retrying per the back-off schedule.
    pub async fn send_signed(
        &self,
        url: &str,
        event: &WebhookEvent,
        signing_secret: Option<&str>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let delivery_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = signing_secret.map(|s| hmac_sha256_hex(s, &payload));

        for (attempt, &delay) in self.backoff_secs.iter().enumerate() {
            if delay > 0 {
                debug!(
                    url,
                    attempt,
                    delay_secs = delay,
                    event_type = %event.event_type,
                    "retrying webhook delivery"
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-wfa-delivery-id", &delivery_id)
                .header("x-wfa-timestamp", &timestamp)
                .header("x-wfa-event", &event.event_type);

            if let Some(ref sig) = signature {
                req = req.header("x-wfa-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        "webhook delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        url,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %status,
                        body = %body,
                        "webhook delivery failed (non-2xx)"
                    );
                }
                Err(e) => {
                    warn!(
                        url,
                        delivery_id = %delivery_id,
                        attempt,
                        error = %e,
                        "webhook request error"
                    );
                }
            }
        }

        Err(anyhow::anyhow!(
            "webhook delivery failed after {} attempts: {}",
            self.backoff_secs.len(),
            url
        ))
    }

    /// Deliver to every URL in turn. Failures are logged, never returned.
    pub async fn deliver_all(&self, urls: &[String], event: &WebhookEvent, signing_secret: Option<&str>) {
        for url in urls {
            if let Err(e) = self.send_signed(url, event, signing_secret).await {
                warn!(url, error = %e, "webhook dispatch ultimately failed");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> BreachAlert {
        let now = Utc::now();
        BreachAlert {
            approval_id: "APR-1".into(),
            step_number: 2,
            workflow_type: Some("purchase-order".into()),
            due_time: now,
            breached_at: now,
        }
    }

    #[test]
    fn test_breach_event_fields() {
        let event = WebhookEvent::sla_breached(&alert());
        assert_eq!(event.event_type, "sla_breached");
        assert_eq!(event.approval_id, "APR-1");
        assert_eq!(event.step_number, 2);
        assert_eq!(event.details["workflow_type"], "purchase-order");
    }

    #[test]
    fn test_hmac_signature_deterministic() {
        let sig1 = hmac_sha256_hex("secret123", b"payload");
        let sig2 = hmac_sha256_hex("secret123", b"payload");
        assert_eq!(sig1, sig2);
        assert!(sig1.starts_with("sha256="));
        assert_ne!(sig1, hmac_sha256_hex("secret124", b"payload"));
    }

    #[tokio::test]
    async fn test_signed_delivery_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-wfa-event", "sla_breached"))
            .and(header_exists("x-wfa-signature"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new().unwrap();
        let url = format!("{}/hook", server.uri());
        notifier
            .send_signed(&url, &WebhookEvent::sla_breached(&alert()), Some("s3cret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delivery_gives_up_after_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new().unwrap().with_backoff(vec![0, 0]);
        let result = notifier
            .send_signed(&server.uri(), &WebhookEvent::sla_breached(&alert()), None)
            .await;
        assert!(result.is_err());
    }
}
