//! Listening server.
//!
//! [`Server`] accepts TCP connections, wraps each in a
//! [`Connection`](crate::Connection) and starts it. It enforces the
//! connection limit, keeps every live connection in a shared
//! [`ConnManager`], and on shutdown stops all connections and the worker
//! pool before returning.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    codec::WireCodec,
    config::ServerConfig,
    dispatch::Router,
    hooks::ConnectionHooks,
    manager::ConnManager,
};

/// TCP server for a [`Router`].
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](Server::bind) or
/// [`bind_existing_listener`](Server::bind_existing_listener) before running.
pub struct Server<S = Unbound>
where
    S: ServerState,
{
    pub(crate) config: ServerConfig,
    pub(crate) router: Arc<Router>,
    pub(crate) hooks: ConnectionHooks,
    pub(crate) codec: Arc<dyn WireCodec>,
    /// Fires once when the accept loop is running.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) backoff_config: BackoffConfig,
    pub(crate) manager: Arc<ConnManager>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for server backoff behavior.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
