mod sqlite;
mod traits;

pub use sqlite::*;
pub use traits::*;
