//! Builders for connections under test.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use linkframe::{
    CompactCodec,
    Connection,
    ConnectionConfig,
    ConnectionHooks,
    ConnectionId,
    ConnectionRegistry,
    Dispatcher,
    Request,
    Router,
    ServerContext,
    WireCodec,
};
use rstest::fixture;
use tokio::io::DuplexStream;

/// Message id answered by [`echo_router`].
pub const ECHO_ID: u16 = 1;

/// Capacity of the in-memory pipe behind [`TestContext::duplex_connection`].
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Loopback address reported as the peer of in-memory connections.
#[must_use]
pub fn peer() -> SocketAddr { SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000)) }

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// Router echoing every [`ECHO_ID`] frame back to its sender.
#[fixture]
pub fn echo_router() -> Router {
    let router = Router::new().route(ECHO_ID, |req: Request| async move {
        let _ = req
            .connection()
            .send_message(req.msg_id(), req.data().clone())
            .await;
    });
    match router {
        Ok(router) => router,
        Err(e) => panic!("fresh router rejected echo route: {e}"),
    }
}

/// Collaborators for building connections outside a server.
pub struct TestContext {
    ctx: ServerContext,
}

impl TestContext {
    /// Compact codec, default settings, and a task per request.
    #[must_use]
    pub fn new(router: Router) -> Self {
        let codec: Arc<dyn WireCodec> = Arc::new(CompactCodec::default());
        Self {
            ctx: ServerContext::new(
                ConnectionConfig::default(),
                codec,
                Arc::new(Dispatcher::unpooled(Arc::new(router))),
            ),
        }
    }

    /// Replace the codec.
    #[must_use]
    pub fn codec<C: WireCodec>(mut self, codec: C) -> Self {
        self.ctx.codec = Arc::new(codec);
        self
    }

    /// Replace the per-connection settings.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.ctx.config = config;
        self
    }

    /// Replace the lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.ctx = self.ctx.with_hooks(hooks);
        self
    }

    /// Register connections with `registry`.
    #[must_use]
    pub fn registry<R>(mut self, registry: &Arc<R>) -> Self
    where
        R: ConnectionRegistry + 'static,
    {
        self.ctx = self.ctx.with_registry(registry);
        self
    }

    /// The assembled context.
    #[must_use]
    pub fn context(&self) -> ServerContext { self.ctx.clone() }

    /// Connection over one end of an in-memory pipe; the other end is returned.
    #[must_use]
    pub fn duplex_connection(&self, id: u32) -> (Arc<Connection>, DuplexStream) {
        let (server, client) = tokio::io::duplex(PIPE_CAPACITY);
        (
            Connection::new(ConnectionId::new(id), server, peer(), self.context()),
            client,
        )
    }
}
