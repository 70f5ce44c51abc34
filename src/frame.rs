//! Decoded wire messages.
//!
//! A [`Frame`] is one complete message read from (or destined for) a socket:
//! a 16-bit message identifier, the declared payload length and the payload
//! itself, plus the optional sign and send-timestamp fields carried by some
//! wire formats. [`FrameHead`] is the partially decoded state produced from
//! the fixed-size head before the payload has been read.

use bincode::{
    BorrowDecode,
    Encode,
    borrow_decode_from_slice,
    config,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};
use bytes::Bytes;

use crate::codec::CodecError;

/// Head fields decoded ahead of the payload.
///
/// A head is never dispatched on its own; it is merged with the payload by
/// [`WireCodec::decode_body`](crate::codec::WireCodec::decode_body).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHead {
    /// Message identifier used for routing.
    pub id: u16,
    /// Number of payload bytes following the head.
    pub declared_len: u16,
    /// Optional sign field.
    pub sign: Option<u16>,
    /// Optional send time in Unix seconds.
    pub sent_at: Option<u32>,
}

impl FrameHead {
    /// Declared payload length as a `usize`.
    #[must_use]
    pub fn payload_len(&self) -> usize { usize::from(self.declared_len) }
}

/// One complete message.
///
/// `payload.len() == declared_len` holds for every `Frame`; both
/// constructors enforce it.
///
/// # Examples
///
/// ```
/// use linkframe::Frame;
///
/// let frame = Frame::new(7, &b"ping"[..]).expect("payload fits");
/// assert_eq!(frame.id(), 7);
/// assert_eq!(frame.declared_len(), 4);
/// assert_eq!(frame.payload().as_ref(), b"ping");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    id: u16,
    declared_len: u16,
    payload: Bytes,
    sign: Option<u16>,
    sent_at: Option<u32>,
}

impl Frame {
    /// Build a frame carrying `payload` under message identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if the payload length does not
    /// fit the 16-bit length field.
    pub fn new(id: u16, payload: impl Into<Bytes>) -> Result<Self, CodecError> {
        let payload = payload.into();
        let declared_len = u16::try_from(payload.len()).map_err(|_| CodecError::PayloadTooLarge {
            size: payload.len(),
            max: usize::from(u16::MAX),
        })?;
        Ok(Self {
            id,
            declared_len,
            payload,
            sign: None,
            sent_at: None,
        })
    }

    /// Merge a decoded head with its payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthMismatch`] if `payload` does not match the
    /// length declared in `head`.
    pub fn from_head(head: FrameHead, payload: Bytes) -> Result<Self, CodecError> {
        if payload.len() != head.payload_len() {
            return Err(CodecError::LengthMismatch {
                declared: head.payload_len(),
                actual: payload.len(),
            });
        }
        Ok(Self {
            id: head.id,
            declared_len: head.declared_len,
            payload,
            sign: head.sign,
            sent_at: head.sent_at,
        })
    }

    /// Serialize `message` with bincode and wrap it in a frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails or
    /// [`CodecError::PayloadTooLarge`] if the encoded message is too long.
    pub fn from_message<M: Encode>(id: u16, message: &M) -> Result<Self, CodecError> {
        let bytes = encode_to_vec(message, config::standard())
            .map_err(|e: EncodeError| CodecError::Encode(e.to_string()))?;
        Self::new(id, bytes)
    }

    /// Decode the payload as a bincode message.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the payload is not a valid `M`.
    pub fn decode_message<M>(&self) -> Result<M, DecodeError>
    where
        M: for<'de> BorrowDecode<'de, ()>,
    {
        borrow_decode_from_slice(&self.payload, config::standard()).map(|(message, _)| message)
    }

    /// Attach a sign value.
    #[must_use]
    pub fn with_sign(mut self, sign: u16) -> Self {
        self.sign = Some(sign);
        self
    }

    /// Attach a send time in Unix seconds.
    #[must_use]
    pub fn with_sent_at(mut self, sent_at: u32) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    /// Message identifier.
    #[must_use]
    pub fn id(&self) -> u16 { self.id }

    /// Payload length declared on the wire.
    #[must_use]
    pub fn declared_len(&self) -> u16 { self.declared_len }

    /// Payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Sign field, when the wire format carries one.
    #[must_use]
    pub fn sign(&self) -> Option<u16> { self.sign }

    /// Send time in Unix seconds, when the wire format carries one.
    #[must_use]
    pub fn sent_at(&self) -> Option<u32> { self.sent_at }

    /// The head describing this frame.
    #[must_use]
    pub fn head(&self) -> FrameHead {
        FrameHead {
            id: self.id,
            declared_len: self.declared_len,
            sign: self.sign,
            sent_at: self.sent_at,
        }
    }

    /// Consume the frame and return its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}
