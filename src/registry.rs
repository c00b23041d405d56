//! Connection registry: the sole source of truth for "who is online".
//!
//! Maintains two concurrent maps kept mutually consistent by the registry's
//! own operations: userId -> ClientConnection for message routing, and
//! connectionId -> userId for cleanup when a socket closes. Neither map is
//! ever exposed to callers.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::ws::ClientConnection;

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    /// userId -> connection, used to route signaling frames to a user.
    users: Arc<DashMap<String, ClientConnection>>,
    /// connectionId -> userId, used to resolve the sender of a frame and to
    /// clean up when a connection closes.
    connections: Arc<DashMap<Uuid, String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to `conn`.
    ///
    /// Fails if the id is blank or already bound to a *different* connection
    /// that is still open. A binding whose connection has closed is replaced,
    /// as is a re-registration from the same connection. The check-and-update
    /// runs under the entry lock for the key, so two racing registrations for
    /// the same id cannot both win.
    pub fn register(&self, user_id: &str, conn: &ClientConnection) -> bool {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            tracing::warn!(connection_id = %conn.id(), "rejected registration with blank user id");
            return false;
        }

        let accepted = match self.users.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.id() != conn.id() && current.is_open() {
                    tracing::warn!(
                        user_id = %user_id,
                        connection_id = %conn.id(),
                        bound_connection_id = %current.id(),
                        "registration rejected, user id bound to a live connection"
                    );
                    false
                } else {
                    // Stale binding or idempotent re-registration: replace.
                    occupied.insert(conn.clone());
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(conn.clone());
                true
            }
        };

        if accepted {
            self.connections.insert(conn.id(), user_id.to_string());
            tracing::info!(user_id = %user_id, connection_id = %conn.id(), "user registered");
        }
        accepted
    }

    /// Remove any binding for `conn`. Idempotent.
    ///
    /// The forward entry is only removed if it still points at this
    /// connection, so unregistering a stale session never evicts a newer one
    /// that replaced it.
    pub fn unregister(&self, conn: &ClientConnection) {
        if let Some((_, user_id)) = self.connections.remove(&conn.id()) {
            self.users
                .remove_if(&user_id, |_, bound| bound.id() == conn.id());
            tracing::info!(user_id = %user_id, connection_id = %conn.id(), "user unregistered");
        } else {
            tracing::debug!(connection_id = %conn.id(), "unregister for a connection that was never registered");
        }
    }

    /// Resolve the live connection for a user.
    ///
    /// A binding whose connection has closed is treated as absent; the stale
    /// entry is removed on the spot so that bindings from clients that
    /// vanished without a close notification don't accumulate.
    pub fn lookup_connection(&self, user_id: &str) -> Option<ClientConnection> {
        let conn = self.users.get(user_id).map(|entry| entry.value().clone())?;
        if conn.is_open() {
            Some(conn)
        } else {
            tracing::warn!(
                user_id = %user_id,
                connection_id = %conn.id(),
                "found stale binding for closed connection, cleaning up"
            );
            self.unregister(&conn);
            None
        }
    }

    /// Resolve the user id a connection registered under, if any.
    pub fn lookup_user_id(&self, conn: &ClientConnection) -> Option<String> {
        self.connections
            .get(&conn.id())
            .map(|entry| entry.value().clone())
    }

    /// Number of currently bound user ids.
    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// Snapshot of the currently bound user ids.
    pub fn user_ids(&self) -> Vec<String> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }
}
