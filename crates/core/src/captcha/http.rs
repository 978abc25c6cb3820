//! HTTP captcha oracle backed by an OCR sidecar service.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::CaptchaOracleConfig;

use super::{normalize_guess, CaptchaError, CaptchaOracle};

/// Oracle that posts the challenge image to an OCR sidecar and reads
/// back `{"text": "..."}`.
pub struct HttpCaptchaOracle {
    client: Client,
    config: CaptchaOracleConfig,
}

impl HttpCaptchaOracle {
    pub fn new(config: CaptchaOracleConfig) -> Result<Self, CaptchaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| CaptchaError::Service(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn solve_url(&self) -> String {
        format!("{}/solve", self.config.url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    text: String,
}

#[async_trait]
impl CaptchaOracle for HttpCaptchaOracle {
    fn name(&self) -> &str {
        "http-ocr"
    }

    async fn solve(&self, image: &[u8]) -> Result<String, CaptchaError> {
        let response = self
            .client
            .post(self.solve_url())
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptchaError::Timeout
                } else {
                    CaptchaError::Service(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CaptchaError::Service(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let solved: SolveResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Service(format!("Failed to parse response: {e}")))?;

        let guess = normalize_guess(&solved.text)?;
        debug!(oracle = self.name(), "Captcha guess produced");
        Ok(guess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_url_trims_trailing_slash() {
        let oracle = HttpCaptchaOracle::new(CaptchaOracleConfig {
            url: "http://localhost:8501/".to_string(),
            timeout_secs: 15,
        })
        .unwrap();
        assert_eq!(oracle.solve_url(), "http://localhost:8501/solve");
    }
}
