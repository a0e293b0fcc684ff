//! WebSocket push of local cache changes.
//!
//! UI clients connect to `/ws` and receive a `changed` message for every
//! write to the local store, so they can re-read instead of polling.

mod manager;
mod protocol;

pub use manager::{spawn_change_forwarder, ConnectionManager};
pub use protocol::*;
