//! Pluggable wire codecs.
//!
//! A [`WireCodec`] translates between [`Frame`] values and bytes on the
//! socket. Decoding happens in two steps so the read loop can pull exactly
//! the right number of bytes from the stream: a fixed-size head is decoded
//! first to learn the payload length, then the payload is read and merged
//! with the head.
//!
//! Two formats ship with the crate, both big-endian:
//!
//! - [`CompactCodec`]: `[id: u16][len: u16]` followed by `len` payload bytes.
//! - [`StampedCodec`]: `[id: u16][len: u16][sign: u16][sent_at: u32]` followed by `len` payload
//!   bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::frame::{Frame, FrameHead};

pub mod error;

pub use error::{CodecError, HeadError};

/// Largest payload representable by the 16-bit length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

pub(crate) fn clamp_packet_size(value: usize) -> usize { value.clamp(1, MAX_PAYLOAD_LEN) }

/// Translate frames to and from their on-wire form.
///
/// Implementations must be stateless: one codec instance is shared by every
/// connection of a server.
pub trait WireCodec: Send + Sync + 'static {
    /// Number of bytes in the fixed-size head.
    fn head_size(&self) -> usize;

    /// Largest payload this codec accepts, in bytes.
    fn max_packet_size(&self) -> usize;

    /// Decode the fixed-size head.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedHead`] wrapping [`HeadError::Truncated`]
    /// if `buf` is shorter than [`head_size`](Self::head_size), or
    /// [`HeadError::Oversized`] if the declared payload length exceeds
    /// [`max_packet_size`](Self::max_packet_size).
    fn decode_head(&self, buf: &[u8]) -> Result<FrameHead, CodecError>;

    /// Merge a decoded head with the payload read after it.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthMismatch`] if the payload length differs
    /// from the length declared by the head.
    fn decode_body(&self, head: FrameHead, payload: Bytes) -> Result<Frame, CodecError> {
        Frame::from_head(head, payload)
    }

    /// Encode a complete frame, head followed by payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if the payload exceeds
    /// [`max_packet_size`](Self::max_packet_size).
    fn encode(&self, frame: &Frame) -> Result<Bytes, CodecError>;
}

fn check_head_len(buf: &[u8], need: usize) -> Result<(), HeadError> {
    if buf.len() < need {
        return Err(HeadError::Truncated {
            have: buf.len(),
            need,
        });
    }
    Ok(())
}

fn check_declared(declared: u16, max: usize) -> Result<(), HeadError> {
    let declared = usize::from(declared);
    if declared > max {
        return Err(HeadError::Oversized { declared, max });
    }
    Ok(())
}

fn check_payload(frame: &Frame, max: usize) -> Result<(), CodecError> {
    let size = frame.payload().len();
    if size > max {
        return Err(CodecError::PayloadTooLarge { size, max });
    }
    Ok(())
}

/// Four-byte head: message identifier then payload length.
///
/// # Examples
///
/// ```
/// use linkframe::{CompactCodec, Frame, WireCodec};
///
/// let codec = CompactCodec::new(4096);
/// let frame = Frame::new(7, &b"ping"[..]).expect("payload fits");
/// let bytes = codec.encode(&frame).expect("encode");
/// assert_eq!(&bytes[..], &[0, 7, 0, 4, b'p', b'i', b'n', b'g']);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CompactCodec {
    max_packet_size: usize,
}

impl CompactCodec {
    /// Head length in bytes.
    pub const HEAD_SIZE: usize = 4;

    /// Construct a codec accepting payloads up to `max_packet_size` bytes.
    ///
    /// The limit is clamped to `1..=65535`.
    #[must_use]
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size: clamp_packet_size(max_packet_size),
        }
    }
}

impl Default for CompactCodec {
    fn default() -> Self { Self::new(4096) }
}

impl WireCodec for CompactCodec {
    fn head_size(&self) -> usize { Self::HEAD_SIZE }

    fn max_packet_size(&self) -> usize { self.max_packet_size }

    fn decode_head(&self, mut buf: &[u8]) -> Result<FrameHead, CodecError> {
        check_head_len(buf, Self::HEAD_SIZE)?;
        let id = buf.get_u16();
        let declared_len = buf.get_u16();
        check_declared(declared_len, self.max_packet_size)?;
        Ok(FrameHead {
            id,
            declared_len,
            sign: None,
            sent_at: None,
        })
    }

    fn encode(&self, frame: &Frame) -> Result<Bytes, CodecError> {
        check_payload(frame, self.max_packet_size)?;
        let mut dst = BytesMut::with_capacity(Self::HEAD_SIZE + frame.payload().len());
        dst.put_u16(frame.id());
        dst.put_u16(frame.declared_len());
        dst.extend_from_slice(frame.payload());
        Ok(dst.freeze())
    }
}

/// Ten-byte head: identifier, length, sign and send time.
///
/// Absent optional fields encode as zero and always decode as `Some`.
#[derive(Clone, Copy, Debug)]
pub struct StampedCodec {
    max_packet_size: usize,
}

impl StampedCodec {
    /// Head length in bytes.
    pub const HEAD_SIZE: usize = 10;

    /// Construct a codec accepting payloads up to `max_packet_size` bytes.
    ///
    /// The limit is clamped to `1..=65535`.
    #[must_use]
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size: clamp_packet_size(max_packet_size),
        }
    }
}

impl Default for StampedCodec {
    fn default() -> Self { Self::new(4096) }
}

impl WireCodec for StampedCodec {
    fn head_size(&self) -> usize { Self::HEAD_SIZE }

    fn max_packet_size(&self) -> usize { self.max_packet_size }

    fn decode_head(&self, mut buf: &[u8]) -> Result<FrameHead, CodecError> {
        check_head_len(buf, Self::HEAD_SIZE)?;
        let id = buf.get_u16();
        let declared_len = buf.get_u16();
        let sign = buf.get_u16();
        let sent_at = buf.get_u32();
        check_declared(declared_len, self.max_packet_size)?;
        Ok(FrameHead {
            id,
            declared_len,
            sign: Some(sign),
            sent_at: Some(sent_at),
        })
    }

    fn encode(&self, frame: &Frame) -> Result<Bytes, CodecError> {
        check_payload(frame, self.max_packet_size)?;
        let mut dst = BytesMut::with_capacity(Self::HEAD_SIZE + frame.payload().len());
        dst.put_u16(frame.id());
        dst.put_u16(frame.declared_len());
        dst.put_u16(frame.sign().unwrap_or_default());
        dst.put_u32(frame.sent_at().unwrap_or_default());
        dst.extend_from_slice(frame.payload());
        Ok(dst.freeze())
    }
}

#[cfg(test)]
mod tests;
