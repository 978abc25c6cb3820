//! Operator notifications.
//!
//! Events are fire-and-forget: emission never blocks or fails the run
//! that produced them. Implementations log delivery problems and move on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operator-facing events emitted at run finalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    RunFailed {
        run_id: String,
        city: String,
        district: String,
        error_type: String,
        error_message: String,
    },
    RunPartial {
        run_id: String,
        city: String,
        district: String,
        records_count: u32,
        parse_failures: u32,
        error_type: Option<String>,
    },
    /// The query legitimately matched zero rows. Worth a look when it
    /// happens for a district that normally produces data.
    EmptyResult {
        run_id: String,
        city: String,
        district: String,
        start_date_roc: String,
        end_date_roc: String,
    },
    CaptchaExhausted {
        run_id: String,
        city: String,
        district: String,
        attempts: u32,
    },
}

impl NotifyEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            NotifyEvent::RunFailed { .. } => "run_failed",
            NotifyEvent::RunPartial { .. } => "run_partial",
            NotifyEvent::EmptyResult { .. } => "empty_result",
            NotifyEvent::CaptchaExhausted { .. } => "captcha_exhausted",
        }
    }
}

/// Sink for operator notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event on a best-effort basis. Never returns an error;
    /// a notification is not worth failing a run over.
    async fn emit(&self, event: NotifyEvent);
}
