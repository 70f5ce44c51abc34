//! Accept loop for the server runtime.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::sleep,
};
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffConfig;
use crate::{
    connection::{Connection, ConnectionId, ServerContext},
    manager::ConnManager,
    metrics,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

/// Allocates connection identifiers, starting at 1 and skipping 0 on wrap.
#[derive(Debug)]
pub(in crate::server) struct ConnectionIds(pub(super) AtomicU32);

impl Default for ConnectionIds {
    fn default() -> Self { Self(AtomicU32::new(1)) }
}

impl ConnectionIds {
    pub(in crate::server) fn next(&self) -> ConnectionId {
        loop {
            let id = self.0.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return ConnectionId::new(id);
            }
        }
    }
}

pub(in crate::server) struct AcceptLoopOptions {
    pub ctx: ServerContext,
    pub manager: Arc<ConnManager>,
    pub max_conn: usize,
    pub shutdown: CancellationToken,
    pub backoff: BackoffConfig,
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each accepted socket becomes a started [`Connection`] unless `max_conn`
/// connections are already live, in which case the socket is dropped.
/// Accept failures are retried after an exponential back-off.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        ctx,
        manager,
        max_conn,
        shutdown,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let ids = ConnectionIds::default();
    let mut delay = backoff.initial_delay;
    loop {
        let accepted = select! {
            biased;

            () = shutdown.cancelled() => break,
            res = listener.accept() => res,
        };
        match accepted {
            Ok((stream, peer_addr)) => {
                delay = backoff.initial_delay;
                if manager.len() >= max_conn {
                    metrics::inc_rejected();
                    warn!(
                        "connection limit reached, rejecting: peer={peer_addr}, max_conn={max_conn}"
                    );
                    drop(stream);
                    continue;
                }
                start_connection(ids.next(), stream, peer_addr, &ctx);
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    () = sleep(delay) => {}
                }
                delay = backoff.next_delay(delay);
            }
        }
    }
}

fn start_connection(id: ConnectionId, stream: TcpStream, peer_addr: SocketAddr, ctx: &ServerContext) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("failed to set TCP_NODELAY: id={id}, peer={peer_addr}, error={e}");
    }
    let conn = Connection::new(id, stream, peer_addr, ctx.clone());
    if let Err(e) = conn.start() {
        warn!("connection failed to start: id={id}, peer={peer_addr}, error={e}");
    }
}
