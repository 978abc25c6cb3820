use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::record::QueryParams;
use crate::session::{ChallengeOutcome, ClientError, PagePayload, RegistryClient};

#[derive(Default)]
struct Inner {
    submit_query_errors: VecDeque<ClientError>,
    fetch_page_errors: VecDeque<ClientError>,
    challenge_outcomes: VecDeque<ChallengeOutcome>,
    pages: Vec<String>,
    query_count: u32,
    challenge_fetch_count: u32,
    challenge_submit_count: u32,
    page_fetch_count: u32,
}

/// Scriptable registry client. Queued errors and challenge outcomes are
/// consumed in order; once a queue is empty the happy path applies.
#[derive(Default)]
pub struct MockRegistryClient {
    inner: Mutex<Inner>,
}

impl MockRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page bodies served in order by `fetch_page`. Pages past the end
    /// of the vec come back empty.
    pub async fn set_pages(&self, pages: Vec<String>) {
        self.inner.lock().await.pages = pages;
    }

    pub async fn push_challenge_outcome(&self, outcome: ChallengeOutcome) {
        self.inner.lock().await.challenge_outcomes.push_back(outcome);
    }

    pub async fn push_submit_query_error(&self, error: ClientError) {
        self.inner.lock().await.submit_query_errors.push_back(error);
    }

    pub async fn push_fetch_page_error(&self, error: ClientError) {
        self.inner.lock().await.fetch_page_errors.push_back(error);
    }

    pub async fn query_count(&self) -> u32 {
        self.inner.lock().await.query_count
    }

    pub async fn challenge_fetch_count(&self) -> u32 {
        self.inner.lock().await.challenge_fetch_count
    }

    pub async fn challenge_submit_count(&self) -> u32 {
        self.inner.lock().await.challenge_submit_count
    }

    pub async fn page_fetch_count(&self) -> u32 {
        self.inner.lock().await.page_fetch_count
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn submit_query(&self, _params: &QueryParams) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().await;
        inner.query_count += 1;
        match inner.submit_query_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn fetch_challenge(&self) -> Result<Vec<u8>, ClientError> {
        let mut inner = self.inner.lock().await;
        inner.challenge_fetch_count += 1;
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn submit_challenge(&self, _guess: &str) -> Result<ChallengeOutcome, ClientError> {
        let mut inner = self.inner.lock().await;
        inner.challenge_submit_count += 1;
        Ok(inner
            .challenge_outcomes
            .pop_front()
            .unwrap_or(ChallengeOutcome::Accepted))
    }

    async fn fetch_page(&self, page_number: u32) -> Result<PagePayload, ClientError> {
        let mut inner = self.inner.lock().await;
        inner.page_fetch_count += 1;
        if let Some(e) = inner.fetch_page_errors.pop_front() {
            return Err(e);
        }
        let body = inner
            .pages
            .get(page_number.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        Ok(PagePayload { page_number, body })
    }
}
