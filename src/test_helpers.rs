//! Test-only helpers for building connections over in-memory streams.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use tokio::io::DuplexStream;

use crate::{
    codec::{CompactCodec, WireCodec},
    config::ConnectionConfig,
    connection::{Connection, ConnectionId, ServerContext},
    dispatch::{Dispatcher, Router},
};

/// Loopback address reported as the peer of in-memory connections.
pub fn peer() -> SocketAddr { SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000)) }

/// Context with an unpooled dispatcher over `router` and the compact codec.
pub fn context(router: Router) -> ServerContext {
    let codec: Arc<dyn WireCodec> = Arc::new(CompactCodec::default());
    ServerContext::new(
        ConnectionConfig::default(),
        codec,
        Arc::new(Dispatcher::unpooled(Arc::new(router))),
    )
}

/// Connection over one end of an in-memory pipe; the other end is returned.
pub fn duplex_connection(id: u32, ctx: ServerContext) -> (Arc<Connection>, DuplexStream) {
    let (server, client) = tokio::io::duplex(64 * 1024);
    (
        Connection::new(ConnectionId::new(id), server, peer(), ctx),
        client,
    )
}
