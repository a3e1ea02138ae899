//! Connection Registry: live mapping from user identity to admitted sockets.
//!
//! A user is online iff they have an entry, and an entry is never empty.
//! Mutations for one user go through that key's DashMap shard lock, so
//! concurrent connects/disconnects for the same user are serialized while
//! other users proceed independently.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::db::models::UserId;
use crate::status::cache::StatusCache;

use super::connection::{Connection, ConnectionId};
use super::protocol::{encode_frame, STATUS_DATABASE_SNAPSHOT, STATUS_RESOURCES_SNAPSHOT};

/// Online/offline transition produced by a registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEdge {
    Online,
    Offline,
}

impl PresenceEdge {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ConnectionCounts {
    pub online_users: usize,
    pub main: usize,
    pub status: usize,
}

pub struct ConnectionRegistry {
    /// user -> admitted main-channel sockets, in admission order
    users: DashMap<UserId, Vec<Connection>>,
    /// status-channel subscribers, not keyed by identity
    status: DashMap<ConnectionId, Connection>,
    status_cache: Arc<StatusCache>,
}

impl ConnectionRegistry {
    pub fn new(status_cache: Arc<StatusCache>) -> Self {
        Self {
            users: DashMap::new(),
            status: DashMap::new(),
            status_cache,
        }
    }

    /// Add a main-channel socket. Returns `Online` for the user's first socket.
    ///
    /// `on_edge` runs while the user's entry is still locked, so edges reach
    /// it in the same order as the mutations that produced them. It must not
    /// call back into the registry.
    pub fn admit_main(
        &self,
        user_id: UserId,
        connection: Connection,
        on_edge: impl FnOnce(PresenceEdge),
    ) -> Option<PresenceEdge> {
        let conn_id = connection.id();
        let mut sockets = self.users.entry(user_id).or_default();
        let edge = sockets.is_empty().then_some(PresenceEdge::Online);
        sockets.push(connection);
        let count = sockets.len();
        if let Some(edge) = edge {
            on_edge(edge);
        }
        drop(sockets);

        tracing::debug!(
            user_id = user_id,
            conn_id = %conn_id,
            connections = count,
            "Main connection registered"
        );

        edge
    }

    /// Add a status subscriber after replaying the cached samples to it.
    pub fn admit_status(&self, connection: Connection) {
        for (name, sample) in [
            (STATUS_RESOURCES_SNAPSHOT, self.status_cache.resources()),
            (STATUS_DATABASE_SNAPSHOT, self.status_cache.database()),
        ] {
            match encode_frame(name, &sample) {
                Ok(frame) => {
                    connection.send_text(frame);
                }
                Err(e) => {
                    tracing::warn!(conn_id = %connection.id(), error = %e, "Failed to encode status snapshot");
                }
            }
        }

        tracing::debug!(conn_id = %connection.id(), "Status connection registered");
        self.status.insert(connection.id(), connection);
    }

    /// Drop a main-channel socket. Returns `Offline` when it was the user's last.
    /// `on_edge` runs under the entry lock, as in [`Self::admit_main`].
    pub fn remove_main(
        &self,
        user_id: UserId,
        conn_id: ConnectionId,
        on_edge: impl FnOnce(PresenceEdge),
    ) -> Option<PresenceEdge> {
        match self.users.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let sockets = entry.get_mut();
                let before = sockets.len();
                sockets.retain(|c| c.id() != conn_id);
                let removed = sockets.len() != before;
                let remaining = sockets.len();

                tracing::debug!(
                    user_id = user_id,
                    conn_id = %conn_id,
                    removed,
                    connections = remaining,
                    "Main connection unregistered"
                );

                let edge = (removed && remaining == 0).then_some(PresenceEdge::Offline);
                if let Some(edge) = edge {
                    on_edge(edge);
                }
                if remaining == 0 {
                    entry.remove();
                }
                edge
            }
            Entry::Vacant(_) => None,
        }
    }

    pub fn remove_status(&self, conn_id: ConnectionId) -> bool {
        let removed = self.status.remove(&conn_id).is_some();
        tracing::debug!(conn_id = %conn_id, removed, "Status connection unregistered");
        removed
    }

    /// Live main-channel sockets for a user; empty when offline.
    pub fn sockets_for(&self, user_id: UserId) -> Vec<Connection> {
        self.users
            .get(&user_id)
            .map(|sockets| sockets.value().clone())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.users.iter().map(|entry| *entry.key()).collect();
        users.sort_unstable();
        users
    }

    pub fn status_subscribers(&self) -> Vec<Connection> {
        self.status.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn counts(&self) -> ConnectionCounts {
        ConnectionCounts {
            online_users: self.users.len(),
            main: self.users.iter().map(|entry| entry.value().len()).sum(),
            status: self.status.len(),
        }
    }
}
