//! Captcha solving capability.
//!
//! The registry gates queries behind a 5-character image captcha. The
//! pipeline does not solve images itself; it delegates to an oracle
//! behind this trait (an OCR sidecar in production, a mock in tests).

mod http;

pub use http::*;

use async_trait::async_trait;
use thiserror::Error;

/// Length of the registry's captcha codes.
pub const CAPTCHA_CODE_LEN: usize = 5;

#[derive(Debug, Clone, Error)]
pub enum CaptchaError {
    #[error("captcha service timed out")]
    Timeout,

    #[error("captcha service error: {0}")]
    Service(String),

    #[error("unusable captcha guess: {0:?}")]
    BadGuess(String),
}

/// A solver that turns a challenge image into a text guess.
///
/// Implementations must not verify the guess against the source; the
/// session owns attempt accounting and verification.
#[async_trait]
pub trait CaptchaOracle: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Produce a guess for the given challenge image bytes.
    async fn solve(&self, image: &[u8]) -> Result<String, CaptchaError>;
}

/// Normalize an oracle guess and check it has the shape of a registry
/// code. A wrong-shaped guess can never be accepted, so it is rejected
/// locally without a round-trip (it still counts as an attempt).
pub fn normalize_guess(raw: &str) -> Result<String, CaptchaError> {
    let guess: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if guess.len() != CAPTCHA_CODE_LEN || !guess.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CaptchaError::BadGuess(raw.to_string()));
    }
    Ok(guess)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_guess_uppercases_and_trims() {
        assert_eq!(normalize_guess(" ab3 f9\n").unwrap(), "AB3F9");
    }

    #[test]
    fn test_normalize_guess_wrong_length() {
        assert!(matches!(
            normalize_guess("abcd"),
            Err(CaptchaError::BadGuess(_))
        ));
        assert!(matches!(
            normalize_guess("abcdef"),
            Err(CaptchaError::BadGuess(_))
        ));
    }

    #[test]
    fn test_normalize_guess_non_alphanumeric() {
        assert!(matches!(
            normalize_guess("ab#12"),
            Err(CaptchaError::BadGuess(_))
        ));
    }
}
