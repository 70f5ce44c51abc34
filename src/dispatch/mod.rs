//! Routing decoded requests to application handlers.
//!
//! A [`Router`] maps message identifiers to [`Handler`]s. A [`Dispatcher`]
//! decides where handlers run: on a [`WorkerPool`], which keeps each
//! connection's requests in order, or on a fresh task per request.

mod pool;
mod router;

use std::sync::Arc;

use async_trait::async_trait;
use futures::Future;
pub use pool::WorkerPool;
pub use router::{Router, RouterError};

use crate::{config::DispatchConfig, request::Request};

/// Application code bound to a message identifier.
///
/// Implemented for any `Fn(Request) -> impl Future<Output = ()>` closure.
///
/// # Examples
///
/// ```
/// use linkframe::{Request, Router};
///
/// let router = Router::new()
///     .route(1, |req: Request| async move {
///         let _ = req.connection().send_message(1, req.data().clone()).await;
///     })
///     .expect("first registration of id 1");
/// assert!(router.contains(1));
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Process one request.
    async fn handle(&self, request: Request);
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, request: Request) { (self)(request).await; }
}

/// Hands requests from read loops to handlers.
///
/// With a worker pool, requests from one connection run one at a time in
/// arrival order and submission waits while the worker's queue is full.
/// Without one, each request runs on its own task: unordered, and with no
/// bound on the number of concurrent handlers.
#[derive(Debug)]
pub struct Dispatcher {
    router: Arc<Router>,
    pool: Option<WorkerPool>,
}

impl Dispatcher {
    /// Build a dispatcher, starting a worker pool when
    /// `config.worker_pool_size` is non-zero.
    ///
    /// Must be called within a Tokio runtime when a pool is configured.
    #[must_use]
    pub fn new(router: Arc<Router>, config: DispatchConfig) -> Self {
        let pool = (config.worker_pool_size > 0).then(|| {
            WorkerPool::start(
                Arc::clone(&router),
                config.worker_pool_size,
                config.max_worker_task_len,
            )
        });
        Self { router, pool }
    }

    /// Build a dispatcher that spawns a task per request.
    #[must_use]
    pub fn unpooled(router: Arc<Router>) -> Self { Self { router, pool: None } }

    /// The routing table.
    #[must_use]
    pub fn router(&self) -> &Arc<Router> { &self.router }

    /// The worker pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&WorkerPool> { self.pool.as_ref() }

    /// Route `request` to its handler.
    ///
    /// Resolves once the request is queued on a worker, or immediately when
    /// running unpooled.
    pub async fn dispatch(&self, request: Request) {
        match &self.pool {
            Some(pool) => pool.submit(request).await,
            None => {
                let router = Arc::clone(&self.router);
                tokio::spawn(async move { router.handle(request).await });
            }
        }
    }

    /// Stop the worker pool, if any, and wait for its workers to exit.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown().await;
        }
    }
}
