//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use groundbook_engine::{EntityKind, RecordId};
use serde::{Deserialize, Serialize};

use crate::connectivity::NetworkState;
use crate::reconcile::SyncSummary;
use crate::store::{ChangeKind, StoreChange};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run a full sync pass now.
    Sync {
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Ask for the current network state.
    Status {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A record in the local store changed.
    Changed {
        kind: EntityKind,
        id: RecordId,
        change: ChangeKind,
    },

    /// Result of a client-requested sync pass.
    SyncResult {
        summary: SyncSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Current network state.
    Status {
        network: NetworkState,
        pending: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }
}

impl From<StoreChange> for ServerMessage {
    fn from(change: StoreChange) -> Self {
        ServerMessage::Changed {
            kind: change.kind,
            id: change.id,
            change: change.change,
        }
    }
}
