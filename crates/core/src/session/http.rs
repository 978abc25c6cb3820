//! reqwest-backed registry client.
//!
//! The registry scopes an established query to the HTTP session cookie,
//! so the client keeps a cookie store and one client instance must not
//! be shared between concurrent runs.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::record::QueryParams;

use super::{ChallengeOutcome, ClientError, PagePayload, RegistryClient};

/// Rows per result page served by the registry grid.
pub const PAGE_SIZE: u32 = 50;

/// Marker string present in the reply to a rejected captcha guess.
const CAPTCHA_REJECTED_MARKER: &str = "驗證碼驗證失敗";

pub struct HttpRegistryClient {
    client: Client,
    config: RegistryConfig,
}

impl HttpRegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else if e.is_connect() {
        ClientError::ConnectionFailed(e.to_string())
    } else {
        ClientError::Api(e.to_string())
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn submit_query(&self, params: &QueryParams) -> Result<(), ClientError> {
        debug!(
            city = %params.city,
            district = %params.district,
            "Submitting registry query"
        );

        let form = [
            ("cityName", params.city.as_str()),
            ("areaCode", params.district.as_str()),
            ("startDate", params.start_date_roc.as_str()),
            ("endDate", params.end_date_roc.as_str()),
            ("registerKind", params.assignment_type.label()),
        ];

        let response = self
            .client
            .post(self.url("/query"))
            .form(&form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_challenge(&self) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url("/captcha/image"))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        debug!(size = bytes.len(), "Fetched challenge image");
        Ok(bytes.to_vec())
    }

    async fn submit_challenge(&self, guess: &str) -> Result<ChallengeOutcome, ClientError> {
        let body = format!("captchaInput={}", urlencoding::encode(guess));

        let response = self
            .client
            .post(self.url("/captcha/verify"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let response = Self::check_status(response).await?;
        let text = response.text().await.map_err(map_reqwest_error)?;

        if text.contains(CAPTCHA_REJECTED_MARKER) {
            debug!("Captcha guess rejected by registry");
            Ok(ChallengeOutcome::Rejected)
        } else {
            Ok(ChallengeOutcome::Accepted)
        }
    }

    async fn fetch_page(&self, page_number: u32) -> Result<PagePayload, ClientError> {
        let url = format!(
            "{}?pageNum={}&pageSize={}",
            self.url("/query/results"),
            page_number,
            PAGE_SIZE
        );

        let response = self.client.get(&url).send().await.map_err(map_reqwest_error)?;
        let response = Self::check_status(response).await?;
        let body = response.text().await.map_err(map_reqwest_error)?;

        debug!(page = page_number, bytes = body.len(), "Fetched result page");
        Ok(PagePayload { page_number, body })
    }
}
