#![doc(html_root_url = "https://docs.rs/linkframe/latest")]
//! Public API for the `linkframe` library.
//!
//! This crate provides an asynchronous TCP server framework. Applications
//! bind message identifiers to handlers; the framework owns socket
//! acceptance, per-connection read/write/heartbeat loops, wire framing and
//! request dispatch.

pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod manager;
pub mod metrics;
pub mod panic;
pub mod request;
pub mod server;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use codec::{CodecError, CompactCodec, HeadError, StampedCodec, WireCodec};
pub use config::{ConnectionConfig, DispatchConfig, ServerConfig};
pub use connection::{
    AttributeStore,
    AttributeValue,
    ConnState,
    Connection,
    ConnectionId,
    ServerContext,
    SharedValue,
};
pub use dispatch::{Dispatcher, Handler, Router, RouterError, WorkerPool};
pub use error::{AttributeError, ConnectionError};
pub use frame::{Frame, FrameHead};
pub use hooks::{ConnectionHooks, HeartbeatStatus};
pub use manager::{ConnManager, ConnectionRegistry};
pub use request::Request;
pub use server::{Server, ServerError};
