//! Hooks and registries that record what a connection did.

use std::sync::{
    Arc,
    Mutex,
    PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use linkframe::{Connection, ConnectionHooks, ConnectionId, ConnectionRegistry, HeartbeatStatus};

/// One lifecycle callback observed by [`RecordingHooks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    Start(ConnectionId),
    Stop(ConnectionId),
    Heartbeat(ConnectionId, HeartbeatStatus),
}

/// Shared log of hook invocations.
#[derive(Clone, Debug, Default)]
pub struct RecordingHooks {
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl RecordingHooks {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Hooks appending to this log.
    #[must_use]
    pub fn hooks(&self) -> ConnectionHooks {
        let start = self.clone();
        let stop = self.clone();
        let beat = self.clone();
        ConnectionHooks::default()
            .on_start(move |conn: &Arc<Connection>| start.push(HookEvent::Start(conn.id())))
            .on_stop(move |conn: &Arc<Connection>| stop.push(HookEvent::Stop(conn.id())))
            .on_heartbeat(move |conn: &Arc<Connection>, status| {
                beat.push(HookEvent::Heartbeat(conn.id(), status));
            })
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<HookEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&HookEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: HookEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Registry counting `add` and `remove` calls.
#[derive(Debug, Default)]
pub struct CountingRegistry {
    added: AtomicUsize,
    removed: AtomicUsize,
}

impl CountingRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    #[must_use]
    pub fn added(&self) -> usize { self.added.load(Ordering::SeqCst) }

    #[must_use]
    pub fn removed(&self) -> usize { self.removed.load(Ordering::SeqCst) }
}

impl ConnectionRegistry for CountingRegistry {
    fn add(&self, _conn: Arc<Connection>) { self.added.fetch_add(1, Ordering::SeqCst); }

    fn remove(&self, _conn: &Arc<Connection>) { self.removed.fetch_add(1, Ordering::SeqCst); }
}
