//! Outbound breach alerts.
//!
//! The SLA tracker pushes a [`BreachAlert`] onto an unbounded channel the
//! first time a timer is seen breached. [`spawn_breach_dispatcher`] drains
//! that channel and posts each alert to the configured webhooks.

pub mod webhook;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::sla::BreachAlert;
use webhook::{WebhookEvent, WebhookNotifier};

pub fn spawn_breach_dispatcher(
    mut alerts: UnboundedReceiver<BreachAlert>,
    notifier: WebhookNotifier,
    urls: Vec<String>,
    signing_secret: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(alert) = alerts.recv().await {
            if urls.is_empty() {
                debug!(approval_id = %alert.approval_id, "no webhook URLs configured, skipping breach alert");
                continue;
            }
            let event = WebhookEvent::sla_breached(&alert);
            notifier
                .deliver_all(&urls, &event, signing_secret.as_deref())
                .await;
        }
        debug!("breach alert channel closed, dispatcher exiting");
    })
}
