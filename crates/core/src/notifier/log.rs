use async_trait::async_trait;
use tracing::info;

use super::{NotifyEvent, Notifier};

/// Fallback sink used when no webhook is configured: events land in the
/// log and nowhere else.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, event: NotifyEvent) {
        info!(
            event_type = event.event_type(),
            payload = %serde_json::to_string(&event).unwrap_or_default(),
            "Notification (log only)"
        );
    }
}
