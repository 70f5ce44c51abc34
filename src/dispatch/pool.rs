//! Fixed-size pool of handler workers.

use std::sync::Arc;

use tokio::{select, sync::mpsc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

use super::Router;
use crate::request::Request;

/// Workers draining per-worker bounded queues.
///
/// A request goes to queue `connection_id % size`, so one connection's
/// requests always land on the same worker and run in arrival order.
#[derive(Debug)]
pub struct WorkerPool {
    queues: Vec<mpsc::Sender<Request>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Spawn `size` workers, each with a queue holding `queue_len` requests.
    ///
    /// Both values are raised to at least 1. Must be called within a Tokio
    /// runtime.
    #[must_use]
    pub fn start(router: Arc<Router>, size: usize, queue_len: usize) -> Self {
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let queues = (0..size.max(1))
            .map(|worker| {
                let (tx, rx) = mpsc::channel(queue_len.max(1));
                tracker.spawn(worker_loop(
                    worker,
                    Arc::clone(&router),
                    rx,
                    shutdown.clone(),
                ));
                tx
            })
            .collect();
        tracker.close();
        Self {
            queues,
            shutdown,
            tracker,
        }
    }

    /// Number of workers.
    #[must_use]
    pub fn size(&self) -> usize { self.queues.len() }

    /// Queue `request` on its connection's worker.
    ///
    /// Waits while that worker's queue is full. Requests submitted after
    /// [`shutdown`](Self::shutdown) are dropped.
    pub async fn submit(&self, request: Request) {
        let conn_id = request.connection().id().as_u32();
        let index = usize::try_from(conn_id).unwrap_or_default() % self.queues.len();
        let Some(queue) = self.queues.get(index) else {
            return;
        };
        if queue.send(request).await.is_err() {
            debug!(%conn_id, worker = index, "worker stopped; request dropped");
        }
    }

    /// Cancel every worker and wait for them to exit.
    ///
    /// Requests still queued are dropped.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.wait().await;
    }
}

async fn worker_loop(
    worker: usize,
    router: Arc<Router>,
    mut rx: mpsc::Receiver<Request>,
    shutdown: CancellationToken,
) {
    loop {
        let request = select! {
            biased;

            () = shutdown.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };
        router.handle(request).await;
    }
    debug!(worker, "worker exited");
}
