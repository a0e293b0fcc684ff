//! SQLite persistence for the local record cache.

mod pool;
mod records;

pub use pool::*;
pub use records::*;
