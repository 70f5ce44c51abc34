//! Peer-side frame IO.

use std::io;

use bytes::Bytes;
use linkframe::{Frame, WireCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

fn invalid_data(err: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Encode `payload` under message `id` with `codec`.
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidData`] if the payload does not fit.
pub fn encode_frame(codec: &dyn WireCodec, id: u16, payload: &[u8]) -> io::Result<Bytes> {
    let frame = Frame::new(id, payload.to_vec()).map_err(invalid_data)?;
    codec.encode(&frame).map_err(invalid_data)
}

/// Encode and write one frame.
///
/// # Errors
///
/// Propagates encoding and write failures.
pub async fn write_frame<W>(
    stream: &mut W,
    codec: &dyn WireCodec,
    id: u16,
    payload: &[u8],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(codec, id, payload)?;
    stream.write_all(&bytes).await?;
    stream.flush().await
}

/// Read and decode one frame.
///
/// # Errors
///
/// Returns [`io::ErrorKind::UnexpectedEof`] if the stream ends first and
/// [`io::ErrorKind::InvalidData`] if the head or body is malformed.
pub async fn read_frame<R>(stream: &mut R, codec: &dyn WireCodec) -> io::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut head = vec![0_u8; codec.head_size()];
    stream.read_exact(&mut head).await?;
    let head = codec.decode_head(&head).map_err(invalid_data)?;
    let mut body = vec![0_u8; head.payload_len()];
    stream.read_exact(&mut body).await?;
    codec.decode_body(head, body.into()).map_err(invalid_data)
}
