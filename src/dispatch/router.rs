//! Message identifier to handler table.

use std::{collections::HashMap, fmt, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use thiserror::Error;
use tracing::{error, warn};

use super::Handler;
use crate::{metrics, panic::format_panic, request::Request};

/// Errors raised while building a [`Router`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// A handler is already bound to this message identifier.
    #[error("route id {0} was already registered")]
    DuplicateRoute(u16),
}

/// Table of handlers keyed by message identifier.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<u16, Arc<dyn Handler>>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Bind `handler` to message identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateRoute`] if `id` is already bound.
    pub fn route<H>(mut self, id: u16, handler: H) -> Result<Self, RouterError>
    where
        H: Handler,
    {
        if self.routes.contains_key(&id) {
            return Err(RouterError::DuplicateRoute(id));
        }
        self.routes.insert(id, Arc::new(handler));
        Ok(self)
    }

    /// Whether a handler is bound to `id`.
    #[must_use]
    pub fn contains(&self, id: u16) -> bool { self.routes.contains_key(&id) }

    /// Number of bound message identifiers.
    #[must_use]
    pub fn len(&self) -> usize { self.routes.len() }

    /// Whether no handler is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Run the handler bound to the request's message identifier.
    ///
    /// Requests without a handler are logged and dropped. A panicking handler
    /// is logged; the panic does not propagate to the caller.
    pub async fn handle(&self, request: Request) {
        let msg_id = request.msg_id();
        let conn_id = request.connection().id();
        let Some(handler) = self.routes.get(&msg_id) else {
            warn!(msg_id, %conn_id, "no handler for message id; request dropped");
            return;
        };
        if let Err(panic) = AssertUnwindSafe(handler.handle(request))
            .catch_unwind()
            .await
        {
            metrics::inc_errors();
            let panic_msg = format_panic(&panic);
            error!(panic = %panic_msg, msg_id, %conn_id, "handler panicked");
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.routes.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("Router").field("routes", &ids).finish()
    }
}
