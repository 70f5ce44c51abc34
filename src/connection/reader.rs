//! Read loop: socket bytes to dispatched requests.

use std::{io, sync::Arc};

use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use tokio::{io::AsyncReadExt, select};

use super::{BoxedReader, Connection};
use crate::{
    codec::CodecError,
    metrics::{self, Direction},
    request::Request,
};

/// Why the read loop ended.
enum ReadEnd {
    /// The peer closed the stream at a frame boundary.
    Eof,
    Io(io::Error),
    Codec(CodecError),
}

impl From<io::Error> for ReadEnd {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<CodecError> for ReadEnd {
    fn from(e: CodecError) -> Self { Self::Codec(e) }
}

pub(super) async fn run(conn: Arc<Connection>, mut reader: BoxedReader) {
    let token = conn.shutdown.clone();
    let end = select! {
        biased;

        () = token.cancelled() => None,
        end = read_frames(&conn, &mut reader) => Some(end),
    };
    match end {
        None => debug!("read loop cancelled: id={}", conn.id),
        Some(ReadEnd::Eof) => info!(
            "connection closed by peer: id={}, peer={}",
            conn.id, conn.peer_addr
        ),
        Some(ReadEnd::Io(e)) => {
            metrics::inc_errors();
            warn!(
                "read failed: id={}, peer={}, error={e}",
                conn.id, conn.peer_addr
            );
        }
        Some(ReadEnd::Codec(e)) => {
            metrics::inc_errors();
            warn!(
                "malformed frame: id={}, peer={}, error={e}",
                conn.id, conn.peer_addr
            );
        }
    }
    drop(reader);
    conn.stop();
}

async fn read_frames(conn: &Arc<Connection>, reader: &mut BoxedReader) -> ReadEnd {
    match read_frames_inner(conn, reader).await {
        Ok(()) => ReadEnd::Eof,
        Err(end) => end,
    }
}

async fn read_frames_inner(conn: &Arc<Connection>, reader: &mut BoxedReader) -> Result<(), ReadEnd> {
    let codec = Arc::clone(&conn.codec);
    let mut head_buf = vec![0_u8; codec.head_size()];
    loop {
        let first = reader.read(&mut head_buf).await?;
        if first == 0 {
            return Ok(());
        }
        if let Some(rest) = head_buf.get_mut(first..) {
            reader.read_exact(rest).await?;
        }
        let head = codec.decode_head(&head_buf)?;

        let payload = if head.declared_len == 0 {
            Bytes::new()
        } else {
            let mut body = BytesMut::zeroed(head.payload_len());
            reader.read_exact(&mut body).await?;
            body.freeze()
        };
        let frame = codec.decode_body(head, payload)?;
        metrics::inc_frames(Direction::Inbound);

        conn.dispatcher
            .dispatch(Request::new(Arc::clone(conn), frame))
            .await;
    }
}
