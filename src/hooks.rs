//! Connection lifecycle callbacks.
//!
//! [`ConnectionHooks`] bundles the optional callbacks a server installs on
//! every connection: one fired after the loops start, one fired exactly once
//! when the connection stops, and one receiving heartbeat reports.

use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

use log::error;

use crate::connection::Connection;

/// Callback invoked with the connection whose lifecycle changed.
pub type ConnectionHook = Arc<dyn Fn(&Arc<Connection>) + Send + Sync + 'static>;

/// Callback receiving heartbeat outcomes.
pub type HeartbeatHook = Arc<dyn Fn(&Arc<Connection>, HeartbeatStatus) + Send + Sync + 'static>;

/// Outcome reported by the heartbeat monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeartbeatStatus {
    /// A pulse arrived before the timeout elapsed.
    Alive,
    /// No pulse arrived within the timeout.
    Expired,
    /// The connection stopped while the monitor was waiting.
    ClosedByShutdown,
}

impl HeartbeatStatus {
    /// Numeric code used by peers that log heartbeat outcomes as integers.
    ///
    /// ```
    /// use linkframe::HeartbeatStatus;
    ///
    /// assert_eq!(HeartbeatStatus::Alive.code(), 0);
    /// assert_eq!(HeartbeatStatus::Expired.code(), 1);
    /// assert_eq!(HeartbeatStatus::ClosedByShutdown.code(), -1);
    /// ```
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Alive => 0,
            Self::Expired => 1,
            Self::ClosedByShutdown => -1,
        }
    }
}

impl fmt::Display for HeartbeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Alive => "alive",
            Self::Expired => "expired",
            Self::ClosedByShutdown => "closed-by-shutdown",
        })
    }
}

/// Optional callbacks fired by each connection.
///
/// Panics raised by a hook are caught and logged; they never unwind into the
/// connection's loops.
///
/// # Examples
///
/// ```
/// use linkframe::{ConnectionHooks, HeartbeatStatus};
///
/// let hooks = ConnectionHooks::default()
///     .on_start(|conn| println!("{} up", conn.id()))
///     .on_heartbeat(|conn, status| {
///         if status == HeartbeatStatus::Expired {
///             println!("{} is quiet", conn.id());
///         }
///     });
/// # drop(hooks);
/// ```
#[derive(Clone, Default)]
pub struct ConnectionHooks {
    on_start: Option<ConnectionHook>,
    on_stop: Option<ConnectionHook>,
    on_heartbeat: Option<HeartbeatHook>,
}

impl ConnectionHooks {
    /// Install the callback fired once the connection's loops are running.
    #[must_use]
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(hook));
        self
    }

    /// Install the callback fired once when the connection stops.
    ///
    /// The connection is still registered and its attributes are readable
    /// while the callback runs.
    #[must_use]
    pub fn on_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>) + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(hook));
        self
    }

    /// Install the callback receiving heartbeat outcomes.
    #[must_use]
    pub fn on_heartbeat<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Connection>, HeartbeatStatus) + Send + Sync + 'static,
    {
        self.on_heartbeat = Some(Arc::new(hook));
        self
    }

    pub(crate) fn run_start(&self, conn: &Arc<Connection>) {
        if let Some(hook) = &self.on_start {
            guarded("on_start", conn, || hook(conn));
        }
    }

    pub(crate) fn run_stop(&self, conn: &Arc<Connection>) {
        if let Some(hook) = &self.on_stop {
            guarded("on_stop", conn, || hook(conn));
        }
    }

    pub(crate) fn run_heartbeat(&self, conn: &Arc<Connection>, status: HeartbeatStatus) {
        if let Some(hook) = &self.on_heartbeat {
            guarded("on_heartbeat", conn, || hook(conn, status));
        }
    }
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .field("on_heartbeat", &self.on_heartbeat.is_some())
            .finish()
    }
}

fn guarded(name: &str, conn: &Arc<Connection>, f: impl FnOnce()) {
    if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(f)) {
        let panic_msg = crate::panic::format_panic(&panic);
        error!(
            "connection hook panicked: hook={name}, panic={panic_msg}, id={}, peer={:?}",
            conn.id(),
            conn.peer_addr()
        );
    }
}
