//! Starting and stopping a connection.

use std::sync::{Arc, PoisonError};

use log::{debug, info};

use super::{
    Connection,
    ConnectionError,
    counter::ActiveConnection,
    heartbeat,
    reader,
    state::ConnState,
    writer,
};

/// State guarded by the lifecycle mutex.
///
/// The `Running → Closing` transition is the one-shot latch for `stop`.
#[derive(Default)]
pub(super) struct Lifecycle {
    pub(super) state: ConnState,
    active: Option<ActiveConnection>,
    /// Set while the on-start hook runs.
    starting: bool,
    /// A stop arrived while `starting` was set.
    stop_deferred: bool,
}

impl Connection {
    /// Register the connection and spawn its loops.
    ///
    /// The on-start hook runs before any loop is spawned. Data the hook
    /// queues is drained once the write loop starts. The read loop and, when
    /// configured, the heartbeat monitor follow.
    ///
    /// A [`stop`](Self::stop) requested while the on-start hook runs takes
    /// effect when the hook returns, so the on-stop hook never overlaps it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::AlreadyStarted`] unless the connection is in
    /// [`ConnState::Created`].
    pub fn start(self: &Arc<Self>) -> Result<(), ConnectionError> {
        let io = {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.state != ConnState::Created {
                return Err(ConnectionError::AlreadyStarted(self.id));
            }
            let io = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or(ConnectionError::AlreadyStarted(self.id))?;
            lifecycle.state = ConnState::Running;
            lifecycle.starting = true;
            lifecycle.active = Some(ActiveConnection::new());
            // Registered under the lock so a racing stop always removes after.
            if let Some(registry) = self.registry.upgrade() {
                registry.add(Arc::clone(self));
            }
            io
        };
        info!(
            "connection started: id={}, peer={}, active={}",
            self.id,
            self.peer_addr,
            super::active_connection_count()
        );

        self.hooks.run_start(self);
        let stop_deferred = {
            let mut lifecycle = self.lock_lifecycle();
            lifecycle.starting = false;
            std::mem::take(&mut lifecycle.stop_deferred)
        };

        self.tasks.spawn(writer::run(
            Arc::clone(self),
            io.writer,
            io.direct_rx,
            io.buffered_rx,
        ));
        self.tasks.spawn(reader::run(Arc::clone(self), io.reader));
        if let Some(timeout) = self.config.heartbeat {
            self.tasks.spawn(heartbeat::run(Arc::clone(self), timeout));
        }
        self.tasks.close();
        if stop_deferred {
            debug!("running stop deferred during start: id={}", self.id);
            self.stop();
        }
        Ok(())
    }

    /// Stop the connection. Safe to call any number of times from any task.
    ///
    /// Only the first call on a running connection has an effect: it runs the
    /// on-stop hook, refuses further sends, cancels every loop, removes the
    /// connection from the registry and marks it [`ConnState::Closed`]. The
    /// loops exit asynchronously; await [`wait_closed`](Self::wait_closed) to
    /// observe that.
    ///
    /// Stopping a connection that was never started does nothing. A stop
    /// issued while the on-start hook runs is deferred until it returns.
    pub fn stop(self: &Arc<Self>) {
        {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.state {
                ConnState::Created => {
                    debug!("stop ignored, connection not started: id={}", self.id);
                    return;
                }
                ConnState::Closing | ConnState::Closed => return,
                ConnState::Running if lifecycle.starting => {
                    lifecycle.stop_deferred = true;
                    return;
                }
                ConnState::Running => lifecycle.state = ConnState::Closing,
            }
        }

        self.hooks.run_stop(self);

        let senders = self
            .outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shutdown.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self);
        }
        drop(senders);

        let active = {
            let mut lifecycle = self.lock_lifecycle();
            lifecycle.state = ConnState::Closed;
            lifecycle.active.take()
        };
        drop(active);
        info!(
            "connection stopped: id={}, peer={}, active={}",
            self.id,
            self.peer_addr,
            super::active_connection_count()
        );
    }

    /// Wait until every loop spawned by [`start`](Self::start) has exited.
    ///
    /// Returns immediately for a connection that was never started.
    pub async fn wait_closed(&self) {
        if self.state() == ConnState::Created {
            return;
        }
        self.tasks.wait().await;
    }
}
