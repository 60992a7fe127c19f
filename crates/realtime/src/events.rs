//! WebSocket wire events. Frames are JSON text tagged by `type`.

use parley_database::Message;
use serde::{Deserialize, Serialize};

use crate::handle::{ConnectionId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Hello {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    /// Full online roster. Replaces whatever the client held before.
    PresenceSnapshot { online_users: Vec<UserId> },
    NewMessage { message: Message },
    Pong,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Ping,
    Logout,
}
