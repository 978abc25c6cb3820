use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::notifier::{Notifier, NotifyEvent};

/// Notifier double that records emitted events. With `set_fail(true)` it
/// drops events on the floor instead, mimicking a dead webhook; emission
/// still completes without error either way.
#[derive(Default)]
pub struct MockNotifier {
    events: Mutex<Vec<NotifyEvent>>,
    fail: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn recorded_events(&self) -> Vec<NotifyEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn emit(&self, event: NotifyEvent) {
        if self.fail.load(Ordering::SeqCst) {
            return;
        }
        self.events.lock().await.push(event);
    }
}
