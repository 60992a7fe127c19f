//! A single live connection as seen by the registry and dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::events::ServerEvent;

pub type ConnectionId = Uuid;

/// Public id of an authenticated user.
pub type UserId = String;

/// Holds the sending half of a connection's bounded outbound queue.
///
/// Pushing never waits: a full or closed queue is reported as a
/// [`DeliveryError`] for this handle alone.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
    alive: AtomicBool,
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(user_id: impl Into<UserId>, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
            sender,
        }
    }

    pub fn push(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        if !self.is_alive() {
            return Err(DeliveryError::Closed);
        }

        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, user_id = %self.user_id, "outbound queue full, dropping event");
                Err(DeliveryError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                Err(DeliveryError::Closed)
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}
