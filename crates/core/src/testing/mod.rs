//! Test doubles and page fixtures shared by unit and integration tests.

mod mock_captcha;
mod mock_notifier;
mod mock_registry;

pub mod fixtures;

pub use mock_captcha::*;
pub use mock_notifier::*;
pub use mock_registry::*;
