use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::captcha::{CaptchaError, CaptchaOracle};

struct Inner {
    errors: VecDeque<CaptchaError>,
    guess: String,
    solve_count: u32,
}

/// Oracle double that answers every image with a fixed guess, unless an
/// error has been queued for the next call.
pub struct MockCaptchaOracle {
    inner: Mutex<Inner>,
}

impl MockCaptchaOracle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                errors: VecDeque::new(),
                guess: "AB123".to_string(),
                solve_count: 0,
            }),
        }
    }

    pub async fn push_error(&self, error: CaptchaError) {
        self.inner.lock().await.errors.push_back(error);
    }

    pub async fn set_guess(&self, guess: &str) {
        self.inner.lock().await.guess = guess.to_string();
    }

    pub async fn solve_count(&self) -> u32 {
        self.inner.lock().await.solve_count
    }
}

impl Default for MockCaptchaOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptchaOracle for MockCaptchaOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn solve(&self, _image: &[u8]) -> Result<String, CaptchaError> {
        let mut inner = self.inner.lock().await;
        inner.solve_count += 1;
        match inner.errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(inner.guess.clone()),
        }
    }
}
