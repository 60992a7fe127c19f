//! Parley realtime core.
//!
//! Tracks which users are online, drives each WebSocket connection through its
//! lifecycle, and pushes freshly persisted messages to their receivers.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handle;
pub mod lifecycle;
pub mod registry;
pub mod service;

pub use auth::SessionAuthenticator;
pub use dispatcher::{DeliveryDispatcher, DispatchReport};
pub use error::{DeliveryError, RealtimeError, SendError};
pub use events::{ClientEvent, ServerEvent};
pub use handle::{ConnectionHandle, ConnectionId, UserId};
pub use lifecycle::{CloseReason, Connection, ConnectionState};
pub use registry::{PresenceRegistry, PresenceUpdate};
pub use service::{MessageService, SendMessageRequest};
