use async_trait::async_trait;
use thiserror::Error;

use crate::record::QueryParams;

use super::{ChallengeOutcome, PagePayload};

/// Transport-level failures talking to the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("registry error: {0}")]
    Api(String),
}

impl ClientError {
    /// Transient failures are worth retrying; a well-formed error reply
    /// from the registry is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Timeout | ClientError::ConnectionFailed(_))
    }
}

/// Low-level registry operations, one cookie-scoped session per client.
///
/// The [`SourceSession`](super::SourceSession) drives these in order;
/// implementations only move bytes and never retry on their own.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Submit the query form (city, district, date range, kind).
    async fn submit_query(&self, params: &QueryParams) -> Result<(), ClientError>;

    /// Fetch a freshly generated challenge image. Each call invalidates
    /// the previous image.
    async fn fetch_challenge(&self) -> Result<Vec<u8>, ClientError>;

    /// Submit a captcha guess for the pending challenge.
    async fn submit_challenge(&self, guess: &str) -> Result<ChallengeOutcome, ClientError>;

    /// Fetch one result page of the established query.
    async fn fetch_page(&self, page_number: u32) -> Result<PagePayload, ClientError>;
}
