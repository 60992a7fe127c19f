//! One connection's lifespan: `Connecting → Authenticated → Active → Closed`.
//!
//! Only `activate` registers with the presence registry, so a rejected
//! credential never shows up as online. Leaving `Active` always unregisters,
//! either through an explicit [`Connection::close`] or through `Drop` when the
//! owning task ends abnormally.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::SessionAuthenticator;
use crate::error::{DeliveryError, RealtimeError};
use crate::events::{ClientEvent, ServerEvent};
use crate::handle::{ConnectionHandle, ConnectionId, UserId};
use crate::registry::PresenceRegistry;

// The hello frame and the first roster are queued back to back.
const MIN_QUEUE_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    TransportError,
    IdleTimeout,
    Logout,
    AuthenticationFailed,
    ServerShutdown,
    Dropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::Logout => "logout",
            CloseReason::AuthenticationFailed => "authentication_failed",
            CloseReason::ServerShutdown => "server_shutdown",
            CloseReason::Dropped => "dropped",
        };
        f.write_str(reason)
    }
}

pub struct Connection {
    registry: Arc<PresenceRegistry>,
    queue_capacity: usize,
    state: ConnectionState,
    user_id: Option<UserId>,
    handle: Option<Arc<ConnectionHandle>>,
}

impl Connection {
    pub fn new(registry: Arc<PresenceRegistry>, queue_capacity: usize) -> Self {
        Self {
            registry,
            queue_capacity: queue_capacity.max(MIN_QUEUE_CAPACITY),
            state: ConnectionState::Connecting,
            user_id: None,
            handle: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.handle.as_ref().map(|handle| handle.id)
    }

    /// Verify the handshake credential. Any rejection closes the connection.
    pub async fn authenticate(
        &mut self,
        authenticator: &dyn SessionAuthenticator,
        token: Option<&str>,
    ) -> Result<UserId, RealtimeError> {
        self.expect_state(ConnectionState::Connecting, "authenticate")?;

        let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
            debug!("connection attempt without credential");
            self.close(CloseReason::AuthenticationFailed);
            return Err(RealtimeError::MissingCredential);
        };

        match authenticator.authenticate(token).await {
            Ok(user_id) => {
                debug!(user_id = %user_id, "connection authenticated");
                self.user_id = Some(user_id.clone());
                self.state = ConnectionState::Authenticated;
                Ok(user_id)
            }
            Err(error) => {
                warn!(%error, "connection authentication rejected");
                self.close(CloseReason::AuthenticationFailed);
                Err(RealtimeError::Authentication(error))
            }
        }
    }

    /// Create the outbound queue and join the presence registry.
    ///
    /// The returned receiver yields `hello` first, then the current roster.
    pub fn activate(&mut self) -> Result<mpsc::Receiver<ServerEvent>, RealtimeError> {
        self.expect_state(ConnectionState::Authenticated, "activate")?;
        let user_id = self.user_id.clone().ok_or(RealtimeError::InvalidTransition {
            state: self.state,
            action: "activate",
        })?;

        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let handle = Arc::new(ConnectionHandle::new(user_id, sender));

        if let Err(error) = handle.push(ServerEvent::Hello {
            user_id: handle.user_id.clone(),
            connection_id: handle.id,
        }) {
            debug!(conn_id = %handle.id, %error, "hello not queued");
        }

        self.handle = Some(Arc::clone(&handle));
        self.state = ConnectionState::Active;
        self.registry.register(Arc::clone(&handle));

        info!(user_id = %handle.user_id, conn_id = %handle.id, "connection active");
        Ok(receiver)
    }

    /// Apply an inbound client event. Returns the state afterwards.
    pub fn handle_event(&mut self, event: ClientEvent) -> ConnectionState {
        match event {
            ClientEvent::Ping => {
                if let Some(handle) = &self.handle {
                    if let Err(error) = handle.push(ServerEvent::Pong) {
                        debug!(conn_id = %handle.id, %error, "pong not queued");
                    }
                }
            }
            ClientEvent::Logout => {
                self.close(CloseReason::Logout);
            }
        }
        self.state
    }

    /// Queue an event on this connection only.
    pub fn push(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        match &self.handle {
            Some(handle) => handle.push(event),
            None => Err(DeliveryError::Closed),
        }
    }

    /// Move to `Closed`. Returns `false` when the connection was already closed.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            ConnectionState::Closed => false,
            ConnectionState::Active => {
                self.state = ConnectionState::Closed;
                if let Some(handle) = self.handle.take() {
                    handle.mark_dead();
                    self.registry.unregister(&handle.user_id, handle.id);
                    info!(user_id = %handle.user_id, conn_id = %handle.id, %reason, "connection closed");
                }
                true
            }
            ConnectionState::Connecting | ConnectionState::Authenticated => {
                self.state = ConnectionState::Closed;
                debug!(user_id = ?self.user_id, %reason, "connection closed before activation");
                true
            }
        }
    }

    fn expect_state(
        &self,
        expected: ConnectionState,
        action: &'static str,
    ) -> Result<(), RealtimeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RealtimeError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close(CloseReason::Dropped);
    }
}
