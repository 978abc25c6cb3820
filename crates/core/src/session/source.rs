//! The per-run source session state machine.
//!
//! One session owns one established query against the registry: submit
//! the form, pass the captcha gate, then page through results. Network
//! operations are retried up to the configured cap with linear backoff;
//! captcha attempts are bounded separately and each one works on a
//! freshly fetched image, because the registry invalidates the image
//! after a rejected guess.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::captcha::CaptchaOracle;
use crate::extractor::PageMeta;
use crate::metrics;
use crate::record::QueryParams;

use super::{
    ChallengeOutcome, ClientError, PagePayload, RegistryClient, SessionConfig, SessionError,
    SessionState,
};

pub struct SourceSession {
    client: Arc<dyn RegistryClient>,
    oracle: Arc<dyn CaptchaOracle>,
    params: QueryParams,
    config: SessionConfig,
    state: SessionState,
    next_page_number: u32,
    rows_seen: u32,
    total_reported: Option<u32>,
    captcha_attempts: u32,
}

impl SourceSession {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        oracle: Arc<dyn CaptchaOracle>,
        params: QueryParams,
        config: SessionConfig,
    ) -> Self {
        Self {
            client,
            oracle,
            params,
            config,
            state: SessionState::SubmittingQuery,
            next_page_number: 1,
            rows_seen: 0,
            total_reported: None,
            captcha_attempts: 0,
        }
    }

    /// Current machine state, inspectable for tests and logging.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Captcha attempts consumed so far in this session.
    pub fn captcha_attempts(&self) -> u32 {
        self.captcha_attempts
    }

    /// Rows observed across all recorded pages.
    pub fn rows_seen(&self) -> u32 {
        self.rows_seen
    }

    /// Total row count the source reported, once a page was recorded.
    pub fn total_reported(&self) -> Option<u32> {
        self.total_reported
    }

    /// Submit the query and pass the captcha gate.
    ///
    /// Idempotent once established; a failure leaves the session in
    /// [`SessionState::Failed`] for good.
    pub async fn establish(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::SubmittingQuery {
            return Ok(());
        }
        match self.establish_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn establish_inner(&mut self) -> Result<(), SessionError> {
        let client = Arc::clone(&self.client);
        let params = self.params.clone();
        self.with_retries("submit_query", || {
            let client = Arc::clone(&client);
            let params = params.clone();
            async move { client.submit_query(&params).await }
        })
        .await?;
        self.state = SessionState::AwaitingChallenge;

        while self.captcha_attempts < self.config.max_captcha_attempts {
            self.captcha_attempts += 1;
            let attempt = self.captcha_attempts;

            self.state = SessionState::AwaitingChallenge;
            let client = Arc::clone(&self.client);
            let image = self
                .with_retries("fetch_challenge", || {
                    let client = Arc::clone(&client);
                    async move { client.fetch_challenge().await }
                })
                .await?;

            self.state = SessionState::SolvingChallenge;
            let guess = match self.oracle.solve(&image).await {
                Ok(guess) => guess,
                Err(e) => {
                    // An unusable guess burns the attempt but not the run.
                    warn!(attempt, error = %e, "Captcha oracle failed");
                    metrics::CAPTCHA_ATTEMPTS.with_label_values(&["error"]).inc();
                    continue;
                }
            };

            let client = Arc::clone(&self.client);
            let outcome = self
                .with_retries("submit_challenge", || {
                    let client = Arc::clone(&client);
                    let guess = guess.clone();
                    async move { client.submit_challenge(&guess).await }
                })
                .await?;

            match outcome {
                ChallengeOutcome::Accepted => {
                    metrics::CAPTCHA_ATTEMPTS
                        .with_label_values(&["accepted"])
                        .inc();
                    info!(attempt, "Captcha accepted, session established");
                    self.state = SessionState::FetchingPage;
                    return Ok(());
                }
                ChallengeOutcome::Rejected => {
                    metrics::CAPTCHA_ATTEMPTS
                        .with_label_values(&["rejected"])
                        .inc();
                    debug!(attempt, "Captcha rejected, refetching image");
                }
            }
        }

        Err(SessionError::CaptchaExhausted {
            attempts: self.captcha_attempts,
        })
    }

    /// Fetch the next result page, establishing the session first if
    /// needed. Returns `None` once the session is done (or failed).
    ///
    /// The caller must feed each page's [`PageMeta`] back through
    /// [`record_page_meta`](Self::record_page_meta); the has-more
    /// decision is based on rows seen vs. the reported total, not on a
    /// page count taken up front.
    pub async fn next_page(&mut self) -> Result<Option<PagePayload>, SessionError> {
        if self.state == SessionState::SubmittingQuery {
            self.establish().await?;
        }
        if self.state.is_terminal() {
            return Ok(None);
        }

        let page_number = self.next_page_number;
        let client = Arc::clone(&self.client);
        let result = self
            .with_retries("fetch_page", || {
                let client = Arc::clone(&client);
                async move { client.fetch_page(page_number).await }
            })
            .await;

        match result {
            Ok(page) => {
                self.next_page_number += 1;
                metrics::PAGES_FETCHED.inc();
                Ok(Some(page))
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Record the extractor's accounting for a fetched page and decide
    /// whether more pages remain.
    pub fn record_page_meta(&mut self, meta: &PageMeta) {
        self.rows_seen += meta.rows_on_page;
        self.total_reported = Some(meta.total_rows_reported);

        if meta.rows_on_page == 0 || self.rows_seen >= meta.total_rows_reported {
            debug!(
                rows_seen = self.rows_seen,
                total = meta.total_rows_reported,
                "Result set exhausted"
            );
            self.state = SessionState::Done;
        }
    }

    /// Run a client operation with the configured retry policy.
    /// Transient errors back off linearly; a non-transient registry
    /// reply fails on the spot.
    async fn with_retries<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, SessionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max = self.config.max_network_attempts.max(1);
        for attempt in 1..=max {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max => {
                    warn!(op, attempt, error = %e, "Transient failure, retrying");
                    metrics::NETWORK_RETRIES.with_label_values(&[op]).inc();
                    tokio::time::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms * attempt as u64,
                    ))
                    .await;
                }
                Err(e) => {
                    return Err(SessionError::Network {
                        attempts: attempt,
                        detail: format!("{op}: {e}"),
                    });
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCaptchaOracle, MockRegistryClient};

    fn test_params() -> QueryParams {
        QueryParams {
            city: "桃園市".to_string(),
            district: "中壢區".to_string(),
            start_date_roc: "114-01-01".to_string(),
            end_date_roc: "114-01-31".to_string(),
            assignment_type: crate::record::AssignmentType::Initial,
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            max_network_attempts: 3,
            max_captcha_attempts: 5,
            retry_backoff_ms: 1,
        }
    }

    fn session_with(client: Arc<MockRegistryClient>, oracle: Arc<MockCaptchaOracle>) -> SourceSession {
        SourceSession::new(client, oracle, test_params(), fast_config())
    }

    #[tokio::test]
    async fn test_establish_happy_path() {
        let client = Arc::new(MockRegistryClient::new());
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        assert_eq!(session.state(), SessionState::SubmittingQuery);
        session.establish().await.unwrap();
        assert_eq!(session.state(), SessionState::FetchingPage);
        assert_eq!(session.captcha_attempts(), 1);
        assert_eq!(client.query_count().await, 1);
        assert_eq!(client.challenge_fetch_count().await, 1);
    }

    #[tokio::test]
    async fn test_captcha_accepted_on_fifth_attempt() {
        let client = Arc::new(MockRegistryClient::new());
        for _ in 0..4 {
            client.push_challenge_outcome(ChallengeOutcome::Rejected).await;
        }
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        session.establish().await.unwrap();
        assert_eq!(session.state(), SessionState::FetchingPage);
        assert_eq!(session.captcha_attempts(), 5);
        // A fresh image is fetched for every attempt.
        assert_eq!(client.challenge_fetch_count().await, 5);
    }

    #[tokio::test]
    async fn test_captcha_exhausted_after_five_rejections() {
        let client = Arc::new(MockRegistryClient::new());
        for _ in 0..5 {
            client.push_challenge_outcome(ChallengeOutcome::Rejected).await;
        }
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        let err = session.establish().await.unwrap_err();
        assert_eq!(err, SessionError::CaptchaExhausted { attempts: 5 });
        assert_eq!(err.error_type(), "CAPTCHA_EXHAUSTED");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(client.challenge_fetch_count().await, 5);
    }

    #[tokio::test]
    async fn test_oracle_error_burns_attempt_without_round_trip() {
        let client = Arc::new(MockRegistryClient::new());
        let oracle = Arc::new(MockCaptchaOracle::new());
        oracle
            .push_error(crate::captcha::CaptchaError::BadGuess("??".into()))
            .await;
        let mut session = session_with(Arc::clone(&client), oracle);

        session.establish().await.unwrap();
        assert_eq!(session.captcha_attempts(), 2);
        // The bad guess was never submitted to the registry.
        assert_eq!(client.challenge_submit_count().await, 1);
    }

    #[tokio::test]
    async fn test_network_failure_after_three_attempts() {
        let client = Arc::new(MockRegistryClient::new());
        for _ in 0..3 {
            client.push_submit_query_error(ClientError::Timeout).await;
        }
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        let err = session.establish().await.unwrap_err();
        assert!(matches!(err, SessionError::Network { attempts: 3, .. }));
        assert_eq!(err.error_type(), "NETWORK_ERROR");
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(client.query_count().await, 3);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_cap() {
        let client = Arc::new(MockRegistryClient::new());
        client.push_submit_query_error(ClientError::Timeout).await;
        client
            .push_submit_query_error(ClientError::ConnectionFailed("refused".into()))
            .await;
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        session.establish().await.unwrap();
        assert_eq!(client.query_count().await, 3);
        assert_eq!(session.state(), SessionState::FetchingPage);
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_immediately() {
        let client = Arc::new(MockRegistryClient::new());
        client
            .push_submit_query_error(ClientError::Api("HTTP 500".into()))
            .await;
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        let err = session.establish().await.unwrap_err();
        assert!(matches!(err, SessionError::Network { attempts: 1, .. }));
        assert_eq!(client.query_count().await, 1);
    }

    #[tokio::test]
    async fn test_pagination_until_total_reached() {
        let client = Arc::new(MockRegistryClient::new());
        client
            .set_pages(vec!["page-one".to_string(), "page-two".to_string()])
            .await;
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(Arc::clone(&client), oracle);

        let page = session.next_page().await.unwrap().unwrap();
        assert_eq!(page.page_number, 1);
        assert_eq!(page.body, "page-one");
        session.record_page_meta(&PageMeta {
            rows_on_page: 50,
            total_rows_reported: 60,
        });
        assert_eq!(session.state(), SessionState::FetchingPage);

        let page = session.next_page().await.unwrap().unwrap();
        assert_eq!(page.page_number, 2);
        session.record_page_meta(&PageMeta {
            rows_on_page: 10,
            total_rows_reported: 60,
        });
        assert_eq!(session.state(), SessionState::Done);

        assert!(session.next_page().await.unwrap().is_none());
        assert_eq!(session.rows_seen(), 60);
    }

    #[tokio::test]
    async fn test_empty_result_set_is_done_after_first_page() {
        let client = Arc::new(MockRegistryClient::new());
        client.set_pages(vec!["empty".to_string()]).await;
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(client, oracle);

        let page = session.next_page().await.unwrap();
        assert!(page.is_some());
        session.record_page_meta(&PageMeta {
            rows_on_page: 0,
            total_rows_reported: 0,
        });
        assert_eq!(session.state(), SessionState::Done);
        assert!(session.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_fetch_failure_fails_session() {
        let client = Arc::new(MockRegistryClient::new());
        for _ in 0..3 {
            client.push_fetch_page_error(ClientError::Timeout).await;
        }
        let oracle = Arc::new(MockCaptchaOracle::new());
        let mut session = session_with(client, oracle);

        let err = session.next_page().await.unwrap_err();
        assert!(matches!(err, SessionError::Network { attempts: 3, .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }
}
