//! Webhook notifier posting events as JSON.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NotifierConfig;
use crate::metrics;

use super::{NotifyEvent, Notifier};

pub struct WebhookNotifier {
    client: Client,
    config: NotifierConfig,
}

impl WebhookNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit(&self, event: NotifyEvent) {
        let event_type = event.event_type();

        let result = self
            .client
            .post(&self.config.webhook_url)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(event_type, "Notification delivered");
                metrics::NOTIFICATIONS
                    .with_label_values(&[event_type, "delivered"])
                    .inc();
            }
            Ok(response) => {
                warn!(
                    event_type,
                    status = %response.status(),
                    "Notification rejected by webhook"
                );
                metrics::NOTIFICATIONS
                    .with_label_values(&[event_type, "rejected"])
                    .inc();
            }
            Err(e) => {
                warn!(event_type, error = %e, "Notification delivery failed");
                metrics::NOTIFICATIONS
                    .with_label_values(&[event_type, "failed"])
                    .inc();
            }
        }
    }
}
