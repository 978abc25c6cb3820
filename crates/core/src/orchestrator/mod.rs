mod runner;
mod types;

pub use runner::*;
pub use types::*;
