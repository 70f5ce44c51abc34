//! Per-connection concurrency engine.
//!
//! A [`Connection`] owns one accepted socket and drives it with up to three
//! tasks: a read loop decoding frames and dispatching requests, a write loop
//! that is the only writer of the socket, and an optional heartbeat monitor.
//! [`Connection::stop`] tears everything down exactly once, no matter how
//! many tasks or callers race to invoke it.

mod attributes;
mod counter;
mod heartbeat;
mod lifecycle;
mod reader;
mod state;
mod writer;

use std::{
    fmt,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak},
};

use bytes::Bytes;
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Notify, mpsc, oneshot},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub use self::{
    attributes::{AttributeStore, AttributeValue, SharedValue},
    counter::active_connection_count,
    state::ConnState,
};
use self::lifecycle::Lifecycle;
use crate::{
    codec::WireCodec,
    config::ConnectionConfig,
    dispatch::Dispatcher,
    error::{AttributeError, ConnectionError},
    frame::Frame,
    hooks::ConnectionHooks,
    manager::{ConnManager, ConnectionRegistry},
    request::Request,
};

/// Identifier assigned to a connection, unique for the server's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u32);

impl From<u32> for ConnectionId {
    fn from(value: u32) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Return the inner `u32` representation.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Server-wide collaborators every connection is built from.
#[derive(Clone)]
pub struct ServerContext {
    /// Per-connection settings.
    pub config: ConnectionConfig,
    /// Wire format shared by all connections.
    pub codec: Arc<dyn WireCodec>,
    /// Destination for decoded requests.
    pub dispatcher: Arc<Dispatcher>,
    /// Lifecycle callbacks.
    pub hooks: Arc<ConnectionHooks>,
    /// Connection directory. Held weakly so the directory may drop first.
    pub registry: Weak<dyn ConnectionRegistry>,
}

impl ServerContext {
    /// Build a context with no hooks and no registry.
    #[must_use]
    pub fn new(
        config: ConnectionConfig,
        codec: Arc<dyn WireCodec>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let registry: Weak<dyn ConnectionRegistry> = Weak::<ConnManager>::new();
        Self {
            config,
            codec,
            dispatcher,
            hooks: Arc::new(ConnectionHooks::default()),
            registry,
        }
    }

    /// Replace the lifecycle callbacks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Register connections with `registry` on start and remove them on stop.
    #[must_use]
    pub fn with_registry<R>(mut self, registry: &Arc<R>) -> Self
    where
        R: ConnectionRegistry + 'static,
    {
        let registry: Weak<R> = Arc::downgrade(registry);
        self.registry = registry;
        self
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Item on the direct channel; `taken` fires when the write loop dequeues it.
struct DirectItem {
    data: Bytes,
    taken: oneshot::Sender<()>,
}

/// Sending sides of the outbound channels. Dropped by `stop`.
struct Outbound {
    direct: mpsc::Sender<DirectItem>,
    buffered: mpsc::Sender<Bytes>,
}

/// Socket halves and receivers parked until `start` hands them to the loops.
struct PendingIo {
    reader: BoxedReader,
    writer: BoxedWriter,
    direct_rx: mpsc::Receiver<DirectItem>,
    buffered_rx: mpsc::Receiver<Bytes>,
}

/// One accepted socket and the tasks driving it.
///
/// Connections are always handled through `Arc<Connection>`; handlers reach
/// theirs through [`Request::connection`](crate::Request::connection).
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    config: ConnectionConfig,
    codec: Arc<dyn WireCodec>,
    dispatcher: Arc<Dispatcher>,
    hooks: Arc<ConnectionHooks>,
    registry: Weak<dyn ConnectionRegistry>,
    shutdown: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    outbound: RwLock<Option<Outbound>>,
    pending: Mutex<Option<PendingIo>>,
    heartbeat: Notify,
    attributes: AttributeStore,
    tasks: TaskTracker,
}

impl Connection {
    /// Wrap `stream` in a connection that has not started yet.
    ///
    /// Data queued with [`send_buffered`](Self::send_buffered) before
    /// [`start`](Self::start) is written once the write loop runs.
    #[must_use]
    pub fn new<S>(id: ConnectionId, stream: S, peer_addr: SocketAddr, ctx: ServerContext) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (direct, direct_rx) = mpsc::channel(1);
        let (buffered, buffered_rx) = mpsc::channel(ctx.config.buffered_capacity.max(1));
        Arc::new(Self {
            id,
            peer_addr,
            config: ctx.config,
            codec: ctx.codec,
            dispatcher: ctx.dispatcher,
            hooks: ctx.hooks,
            registry: ctx.registry,
            shutdown: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
            outbound: RwLock::new(Some(Outbound { direct, buffered })),
            pending: Mutex::new(Some(PendingIo {
                reader: Box::new(reader),
                writer: Box::new(writer),
                direct_rx,
                buffered_rx,
            })),
            heartbeat: Notify::new(),
            attributes: AttributeStore::default(),
            tasks: TaskTracker::new(),
        })
    }

    /// Connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Address of the remote peer.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr { self.peer_addr }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnState { self.lock_lifecycle().state }

    /// Whether [`stop`](Self::stop) has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), ConnState::Closing | ConnState::Closed)
    }

    /// Token cancelled when the connection stops.
    ///
    /// Handlers doing long work can select on it to abandon requests from
    /// closed connections.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken { &self.shutdown }

    /// Codec used to encode outbound messages.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn WireCodec> { &self.codec }

    /// Per-connection settings.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig { &self.config }

    /// Queue `data` for writing and wait until the write loop has taken it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the connection has stopped,
    /// including when it stops while this call is waiting.
    pub async fn send_direct(&self, data: impl Into<Bytes>) -> Result<(), ConnectionError> {
        let direct = self.outbound(|o| o.direct.clone())?;
        let (taken, taken_rx) = oneshot::channel();
        direct
            .send(DirectItem {
                data: data.into(),
                taken,
            })
            .await
            .map_err(|_| ConnectionError::Closed(self.id))?;
        taken_rx.await.map_err(|_| ConnectionError::Closed(self.id))
    }

    /// Queue `data` for writing, waiting only while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the connection has stopped.
    pub async fn send_buffered(&self, data: impl Into<Bytes>) -> Result<(), ConnectionError> {
        let buffered = self.outbound(|o| o.buffered.clone())?;
        buffered
            .send(data.into())
            .await
            .map_err(|_| ConnectionError::Closed(self.id))
    }

    /// Encode a frame with this connection's codec and send it directly.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Codec`] if the frame cannot be encoded and
    /// [`ConnectionError::Closed`] if the connection has stopped.
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), ConnectionError> {
        let bytes = self.codec.encode(frame)?;
        self.send_direct(bytes).await
    }

    /// Frame `payload` under message `id` and send it directly.
    ///
    /// # Errors
    ///
    /// See [`send_frame`](Self::send_frame).
    pub async fn send_message(
        &self,
        id: u16,
        payload: impl Into<Bytes>,
    ) -> Result<(), ConnectionError> {
        self.send_frame(&Frame::new(id, payload)?).await
    }

    /// Frame `payload` under message `id` and queue it on the buffered channel.
    ///
    /// # Errors
    ///
    /// See [`send_frame`](Self::send_frame).
    pub async fn send_buffered_message(
        &self,
        id: u16,
        payload: impl Into<Bytes>,
    ) -> Result<(), ConnectionError> {
        let bytes = self.codec.encode(&Frame::new(id, payload)?)?;
        self.send_buffered(bytes).await
    }

    /// Route `frame` through the dispatcher as if the peer had sent it.
    ///
    /// The request takes the same path as one decoded by the read loop,
    /// including the pooled worker chosen for this connection. Nothing is
    /// written to or read from the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the connection has stopped.
    pub async fn dispatch_local(self: &Arc<Self>, frame: Frame) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed(self.id));
        }
        debug!(
            "dispatching local frame: id={}, msg_id={}, len={}",
            self.id,
            frame.id(),
            frame.declared_len()
        );
        self.dispatcher
            .dispatch(Request::new(Arc::clone(self), frame))
            .await;
        Ok(())
    }

    /// Record liveness for the heartbeat monitor. Never blocks.
    pub fn pulse_heartbeat(&self) { self.heartbeat.notify_one(); }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.set(key, value);
    }

    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::NotFound`] if nothing is stored under `key`.
    pub fn property(&self, key: &str) -> Result<AttributeValue, AttributeError> {
        self.attributes.get(key)
    }

    /// Remove and return the value stored under `key`.
    pub fn remove_property(&self, key: &str) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool { self.attributes.contains(key) }

    /// The attribute store itself, for typed access.
    #[must_use]
    pub fn attributes(&self) -> &AttributeStore { &self.attributes }

    fn outbound<T>(&self, pick: impl FnOnce(&Outbound) -> T) -> Result<T, ConnectionError> {
        let guard = self
            .outbound
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(pick).ok_or(ConnectionError::Closed(self.id))
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
