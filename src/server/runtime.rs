//! Runtime control for [`Server`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use super::{Bound, Server, ServerError};
use crate::{connection::ServerContext, dispatch::Dispatcher};

impl Server<Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use linkframe::{Router, Server, ServerConfig};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), linkframe::ServerError> {
    /// let server = Server::new(ServerConfig::default(), Router::new())
    ///     .bind(([127, 0, 0, 1], 20_000).into())?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use linkframe::{Router, Server, ServerConfig};
    ///
    /// async fn try_run() {
    ///     Server::new(ServerConfig::default(), Router::new())
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; the `Result` is reserved for fatal runtime errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// On shutdown the accept loop stops, every live connection is stopped
    /// (firing its on-stop hook), the call waits for all connection loops to
    /// exit and finally shuts the worker pool down.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkframe::{Router, Server, ServerConfig};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), linkframe::ServerError> {
    /// let server = Server::new(ServerConfig::default(), Router::new())
    ///     .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            config,
            router,
            hooks,
            codec,
            ready_tx,
            backoff_config,
            manager,
            state: Bound { listener },
        } = self;

        let dispatcher = Arc::new(Dispatcher::new(router, config.dispatch_config()));
        let ctx = ServerContext::new(
            config.connection_config(),
            codec,
            Arc::clone(&dispatcher),
        )
        .with_hooks(hooks)
        .with_registry(&manager);

        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let local_addr = listener.local_addr().ok();
        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                ctx,
                manager: Arc::clone(&manager),
                max_conn: config.max_conn,
                shutdown: shutdown_token.clone(),
                backoff: backoff_config,
            },
        ));
        tracker.close();
        info!(
            name = %config.name,
            addr = ?local_addr,
            max_conn = config.max_conn,
            workers = config.worker_pool_size,
            "server started"
        );

        // Signal readiness after the accept loop has been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }
        tracker.wait().await;

        let stopped = manager.stop_all();
        for conn in &stopped {
            conn.wait_closed().await;
        }
        dispatcher.shutdown().await;
        info!(name = %config.name, connections = stopped.len(), "server stopped");
        Ok(())
    }
}
