//! Who is online right now.
//!
//! The registry maps each user to the set of their live connection handles.
//! A user has an entry iff that set is non-empty. Every mutation and the
//! snapshot fan-out it triggers happen under one lock, so each connection
//! observes snapshots in the same order the mutations happened. The fan-out
//! only enqueues onto bounded channels; no I/O happens under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::events::ServerEvent;
use crate::handle::{ConnectionHandle, ConnectionId, UserId};

type HandleSet = HashMap<ConnectionId, Arc<ConnectionHandle>>;

/// What a register/unregister call did to presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceUpdate {
    /// The set of online users changed and a snapshot went to everyone.
    pub changed: bool,
    /// Handles that accepted a snapshot as part of this call.
    pub notified: usize,
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: Mutex<HashMap<UserId, HandleSet>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` under its owner. Registering the same handle twice is a no-op.
    ///
    /// When the owner comes online the new roster goes to every registered
    /// handle, including this one. Otherwise only this handle gets the roster.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> PresenceUpdate {
        let mut entries = self.entries.lock();

        let came_online = !entries.contains_key(&handle.user_id);
        let handles = entries.entry(handle.user_id.clone()).or_default();
        if handles.contains_key(&handle.id) {
            debug!(user_id = %handle.user_id, conn_id = %handle.id, "handle already registered");
            return PresenceUpdate::default();
        }
        handles.insert(handle.id, Arc::clone(&handle));

        let snapshot = snapshot_of(&entries);
        if came_online {
            let notified = broadcast_locked(&entries, &snapshot);
            info!(
                user_id = %handle.user_id,
                conn_id = %handle.id,
                online = snapshot.len(),
                notified,
                "user came online"
            );
            PresenceUpdate {
                changed: true,
                notified,
            }
        } else {
            let notified = usize::from(push_snapshot(&handle, snapshot));
            debug!(user_id = %handle.user_id, conn_id = %handle.id, "additional connection registered");
            PresenceUpdate {
                changed: false,
                notified,
            }
        }
    }

    /// Remove one handle. Unknown handles are logged and ignored.
    ///
    /// The removed handle is never sent the resulting roster.
    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) -> PresenceUpdate {
        let mut entries = self.entries.lock();

        let Some(handles) = entries.get_mut(user_id) else {
            warn!(user_id, conn_id = %connection_id, "unregister for user with no live handles");
            return PresenceUpdate::default();
        };

        if handles.remove(&connection_id).is_none() {
            warn!(user_id, conn_id = %connection_id, "unregister for unknown handle");
            return PresenceUpdate::default();
        }

        if !handles.is_empty() {
            debug!(user_id, conn_id = %connection_id, remaining = handles.len(), "connection closed, user still online");
            return PresenceUpdate::default();
        }

        entries.remove(user_id);
        let snapshot = snapshot_of(&entries);
        let notified = broadcast_locked(&entries, &snapshot);
        info!(user_id, conn_id = %connection_id, online = snapshot.len(), notified, "user went offline");

        PresenceUpdate {
            changed: true,
            notified,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries
            .lock()
            .get(user_id)
            .is_some_and(|handles| !handles.is_empty())
    }

    /// Sorted list of users with at least one live handle.
    pub fn snapshot_online_users(&self) -> Vec<UserId> {
        snapshot_of(&self.entries.lock())
    }

    /// Live handles for `user_id`; empty when the user is offline.
    pub fn handles_for(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.entries
            .lock()
            .get(user_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.entries.lock().values().map(HashMap::len).sum()
    }

    pub fn online_count(&self) -> usize {
        self.entries.lock().len()
    }
}

fn snapshot_of(entries: &HashMap<UserId, HandleSet>) -> Vec<UserId> {
    let mut users: Vec<UserId> = entries.keys().cloned().collect();
    users.sort();
    users
}

fn push_snapshot(handle: &ConnectionHandle, online_users: Vec<UserId>) -> bool {
    match handle.push(ServerEvent::PresenceSnapshot { online_users }) {
        Ok(()) => true,
        Err(error) => {
            debug!(conn_id = %handle.id, %error, "presence snapshot not delivered");
            false
        }
    }
}

fn broadcast_locked(entries: &HashMap<UserId, HandleSet>, snapshot: &[UserId]) -> usize {
    entries
        .values()
        .flat_map(HashMap::values)
        .filter(|handle| push_snapshot(handle, snapshot.to_vec()))
        .count()
}
