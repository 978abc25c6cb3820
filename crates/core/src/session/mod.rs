mod client;
mod http;
mod source;
mod types;

pub use client::*;
pub use http::*;
pub use source::*;
pub use types::*;
