//! Error types for connection operations.
//!
//! Codec failures live in [`crate::codec::error`]; server and configuration
//! errors live next to the types that raise them.

use thiserror::Error;

use crate::{codec::CodecError, connection::ConnectionId};

/// Errors returned by [`Connection`](crate::Connection) operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection has been stopped and no longer accepts outbound data.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    /// `start` was called on a connection that is not freshly created.
    #[error("connection {0} was already started")]
    AlreadyStarted(ConnectionId),
    /// An outbound frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors returned by attribute lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttributeError {
    /// No value is stored under the key.
    #[error("no attribute stored under {key:?}")]
    NotFound {
        /// The missing key.
        key: String,
    },
    /// The stored value is not of the requested kind.
    #[error("attribute {key:?} is not {expected}")]
    TypeMismatch {
        /// The key looked up.
        key: String,
        /// Name of the requested kind.
        expected: &'static str,
    },
}
