//! Connection handlers that outlive a single request.

mod websocket;

pub use websocket::handle_websocket_connection;
