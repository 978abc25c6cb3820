mod address;
mod dates;
mod text;

pub use address::*;
pub use dates::*;
pub use text::*;
