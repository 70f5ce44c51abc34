//! Directory of live connections.
//!
//! Connections register themselves through [`ConnectionRegistry`] when they
//! start and deregister when they stop. [`ConnManager`] is the server's
//! implementation, backed by a [`DashMap`] so lookups never contend with the
//! accept loop.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use crate::connection::{Connection, ConnectionId};

/// Sink for connection registration events.
///
/// Each started connection calls [`add`](Self::add) exactly once and
/// [`remove`](Self::remove) at most once. `add` runs while the connection's
/// lifecycle lock is held, so implementations must not call back into the
/// connection's `start`, `stop` or `state`.
pub trait ConnectionRegistry: Send + Sync {
    /// Record a newly started connection.
    fn add(&self, conn: Arc<Connection>);

    /// Forget a stopped connection.
    ///
    /// Ids wrap after `u32::MAX` connections, so implementations keyed by id
    /// should only drop an entry that is this very connection.
    fn remove(&self, conn: &Arc<Connection>);
}

/// Concurrent directory of live connections keyed by [`ConnectionId`].
#[derive(Default)]
pub struct ConnManager(DashMap<ConnectionId, Arc<Connection>>);

impl ConnManager {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Look up a live connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.0.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Identifiers of the live connections.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> { self.0.iter().map(|entry| *entry.key()).collect() }

    /// Snapshot of the live connections.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.0
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Stop every live connection and return them.
    ///
    /// Connections are collected before any is stopped, so no map lock is
    /// held while on-stop hooks run or while stopping connections remove
    /// themselves. Await [`Connection::wait_closed`] on the returned
    /// connections to know when their loops have exited.
    pub fn stop_all(&self) -> Vec<Arc<Connection>> {
        let conns = self.connections();
        debug!("stopping all connections: count={}", conns.len());
        for conn in &conns {
            conn.stop();
        }
        conns
    }
}

impl ConnectionRegistry for ConnManager {
    fn add(&self, conn: Arc<Connection>) { self.0.insert(conn.id(), conn); }

    fn remove(&self, conn: &Arc<Connection>) {
        self.0.remove_if(&conn.id(), |_, live| Arc::ptr_eq(live, conn));
    }
}

impl std::fmt::Debug for ConnManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnManager")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{connection::ConnState, dispatch::Router, test_helpers};

    #[tokio::test]
    async fn start_registers_and_stop_all_empties() {
        let manager = Arc::new(ConnManager::new());
        let ctx = test_helpers::context(Router::new()).with_registry(&manager);
        let mut clients = Vec::new();
        for id in 1..=3 {
            let (conn, client) = test_helpers::duplex_connection(id, ctx.clone());
            conn.start().expect("fresh connection");
            clients.push(client);
        }
        assert_eq!(manager.len(), 3);
        assert!(manager.get(ConnectionId::new(2)).is_some());

        let stopped = manager.stop_all();
        assert_eq!(stopped.len(), 3);
        for conn in &stopped {
            timeout(Duration::from_secs(1), conn.wait_closed())
                .await
                .expect("loops exit");
            assert_eq!(conn.state(), ConnState::Closed);
        }
        assert!(manager.is_empty());
        assert!(manager.ids().is_empty());
    }

    #[tokio::test]
    async fn stale_connection_does_not_evict_a_reused_id() {
        let manager = Arc::new(ConnManager::new());
        let ctx = test_helpers::context(Router::new()).with_registry(&manager);
        let (stale, _stale_client) = test_helpers::duplex_connection(7, ctx.clone());
        let (live, _live_client) = test_helpers::duplex_connection(7, ctx);
        stale.start().expect("fresh connection");
        live.start().expect("fresh connection");

        stale.stop();
        let found = manager.get(ConnectionId::new(7)).expect("live entry kept");
        assert!(Arc::ptr_eq(&found, &live));

        live.stop();
        assert!(manager.is_empty());
    }

    #[test]
    fn unstarted_connections_are_not_registered() {
        let manager = Arc::new(ConnManager::new());
        let ctx = test_helpers::context(Router::new()).with_registry(&manager);
        let (_conn, _client) = test_helpers::duplex_connection(1, ctx);
        assert!(manager.is_empty());
    }
}
