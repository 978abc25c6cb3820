use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One fetched result page, body still unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    /// 1-based page number within the result set.
    pub page_number: u32,
    pub body: String,
}

/// The source's verdict on a submitted captcha guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Accepted,
    Rejected,
}

/// Observable state of a source session.
///
/// SubmittingQuery → AwaitingChallenge → SolvingChallenge → FetchingPage
/// → (FetchingPage | Done). Any state can move to Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SubmittingQuery,
    AwaitingChallenge,
    SolvingChallenge,
    FetchingPage,
    Done,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::SubmittingQuery => "submitting_query",
            SessionState::AwaitingChallenge => "awaiting_challenge",
            SessionState::SolvingChallenge => "solving_challenge",
            SessionState::FetchingPage => "fetching_page",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    /// Terminal states accept no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// Retry and attempt caps for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Attempts per network operation before giving up.
    #[serde(default = "default_network_attempts")]
    pub max_network_attempts: u32,
    /// Captcha attempts per session, each with a fresh image.
    #[serde(default = "default_captcha_attempts")]
    pub max_captcha_attempts: u32,
    /// Base backoff between network retries, multiplied by attempt number.
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_network_attempts: default_network_attempts(),
            max_captcha_attempts: default_captcha_attempts(),
            retry_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_network_attempts() -> u32 {
    3
}

fn default_captcha_attempts() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    500
}

/// Session-level failures, each mapping to one audit error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("network failure after {attempts} attempt(s): {detail}")]
    Network { attempts: u32, detail: String },

    #[error("captcha rejected {attempts} time(s), giving up")]
    CaptchaExhausted { attempts: u32 },
}

impl SessionError {
    /// Taxonomy string recorded in audit rows.
    pub fn error_type(&self) -> &'static str {
        match self {
            SessionError::Network { .. } => "NETWORK_ERROR",
            SessionError::CaptchaExhausted { .. } => "CAPTCHA_EXHAUSTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_network_attempts, 3);
        assert_eq!(config.max_captcha_attempts, 5);
        assert_eq!(config.retry_backoff_ms, 500);
    }

    #[test]
    fn test_error_type_mapping() {
        let err = SessionError::Network {
            attempts: 3,
            detail: "timeout".to_string(),
        };
        assert_eq!(err.error_type(), "NETWORK_ERROR");

        let err = SessionError::CaptchaExhausted { attempts: 5 };
        assert_eq!(err.error_type(), "CAPTCHA_EXHAUSTED");
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Done.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::FetchingPage.is_terminal());
    }

    #[test]
    fn test_session_state_serde_names() {
        let json = serde_json::to_string(&SessionState::AwaitingChallenge).unwrap();
        assert_eq!(json, "\"awaiting_challenge\"");
    }
}
