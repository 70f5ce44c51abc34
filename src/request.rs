//! Requests handed to handlers.

use std::sync::Arc;

use bincode::{BorrowDecode, error::DecodeError};
use bytes::Bytes;

use crate::{connection::Connection, frame::Frame};

/// A decoded frame paired with the connection it arrived on.
///
/// Cloning is cheap: both parts are reference counted.
#[derive(Clone, Debug)]
pub struct Request {
    conn: Arc<Connection>,
    frame: Frame,
}

impl Request {
    /// Pair `frame` with the connection it was read from.
    #[must_use]
    pub fn new(conn: Arc<Connection>, frame: Frame) -> Self { Self { conn, frame } }

    /// Connection the frame arrived on. Replies are sent through it.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> { &self.conn }

    /// The decoded frame.
    #[must_use]
    pub fn frame(&self) -> &Frame { &self.frame }

    /// Message identifier of the frame.
    #[must_use]
    pub fn msg_id(&self) -> u16 { self.frame.id() }

    /// Payload bytes of the frame.
    #[must_use]
    pub fn data(&self) -> &Bytes { self.frame.payload() }

    /// Sign field, when the wire format carries one.
    #[must_use]
    pub fn sign(&self) -> Option<u16> { self.frame.sign() }

    /// Send time, when the wire format carries one.
    #[must_use]
    pub fn sent_at(&self) -> Option<u32> { self.frame.sent_at() }

    /// Decode the payload as a bincode message.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the payload is not a valid `M`.
    pub fn decode<M>(&self) -> Result<M, DecodeError>
    where
        M: for<'de> BorrowDecode<'de, ()>,
    {
        self.frame.decode_message()
    }

    /// Split into the connection and the frame.
    #[must_use]
    pub fn into_parts(self) -> (Arc<Connection>, Frame) { (self.conn, self.frame) }
}
