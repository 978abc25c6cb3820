mod events;
mod log;
mod webhook;

pub use events::*;
pub use log::*;
pub use webhook::*;
