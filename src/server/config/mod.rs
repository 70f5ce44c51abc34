//! Builder methods for [`Server`].

use std::sync::Arc;

use tokio::sync::oneshot;

use super::{BackoffConfig, Server, ServerState, Unbound};
use crate::{
    codec::WireCodec,
    config::ServerConfig,
    connection::Connection,
    dispatch::Router,
    hooks::{ConnectionHooks, HeartbeatStatus},
    manager::ConnManager,
};

pub mod binding;


impl Server<Unbound> {
    /// Create a server routing requests with `router`.
    ///
    /// The configuration is normalised; the codec defaults to
    /// [`CompactCodec`](crate::CompactCodec) limited to
    /// `config.max_packet_size`.
    #[must_use]
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let config = config.normalized();
        Self {
            codec: config.codec(),
            config,
            router: Arc::new(router),
            hooks: ConnectionHooks::default(),
            ready_tx: None,
            backoff_config: BackoffConfig::default(),
            manager: Arc::new(ConnManager::new()),
            state: Unbound,
        }
    }
}

impl<S> Server<S>
where
    S: ServerState,
{
    /// Replace the wire codec.
    #[must_use]
    pub fn codec<C>(mut self, codec: C) -> Self
    where
        C: WireCodec,
    {
        self.codec = Arc::new(codec);
        self
    }

    /// Register a callback fired once each connection's loops are running.
    #[must_use]
    pub fn on_connection_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_start(hook);
        self
    }

    /// Register a callback fired once when each connection stops.
    #[must_use]
    pub fn on_connection_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_stop(hook);
        self
    }

    /// Register a callback receiving heartbeat outcomes.
    #[must_use]
    pub fn on_heartbeat<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>, HeartbeatStatus) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_heartbeat(hook);
        self
    }

    /// Configure accept-loop back-off. The values are normalised.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff.normalized();
        self
    }

    /// Configure a channel used to signal when the server is ready to accept connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// The server's configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Directory of live connections, shared with the running server.
    #[must_use]
    pub fn connections(&self) -> Arc<ConnManager> { Arc::clone(&self.manager) }
}
