use parley_auth::AuthError;
use parley_database::DatabaseError;
use parley_media::MediaError;
use thiserror::Error;

use crate::lifecycle::ConnectionState;

/// A single push to one connection handle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Full,
}

/// Connection lifecycle failures.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("missing credential")]
    MissingCredential,
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error("cannot {action} a connection in state {state:?}")]
    InvalidTransition {
        state: ConnectionState,
        action: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("{0}")]
    Malformed(String),
    #[error("recipient not found")]
    UnknownRecipient,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("message store unavailable: {0}")]
    StoreUnavailable(#[source] DatabaseError),
}

impl From<DatabaseError> for SendError {
    fn from(error: DatabaseError) -> Self {
        if error.is_foreign_key_violation() {
            SendError::UnknownRecipient
        } else {
            SendError::StoreUnavailable(error)
        }
    }
}
