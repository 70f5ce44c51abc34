//! Write loop: the only task that writes to the socket.

use std::{io, sync::Arc};

use bytes::Bytes;
use log::{debug, warn};
use tokio::{io::AsyncWriteExt, select, sync::mpsc};

use super::{BoxedWriter, Connection, DirectItem};
use crate::metrics::{self, Direction};

pub(super) async fn run(
    conn: Arc<Connection>,
    mut writer: BoxedWriter,
    mut direct: mpsc::Receiver<DirectItem>,
    mut buffered: mpsc::Receiver<Bytes>,
) {
    let token = conn.shutdown.clone();
    let mut direct_open = true;
    loop {
        let data = select! {
            () = token.cancelled() => break,
            item = direct.recv(), if direct_open => match item {
                Some(DirectItem { data, taken }) => {
                    // The sender may have given up waiting; the data is still written.
                    let _ = taken.send(());
                    data
                }
                None => {
                    direct_open = false;
                    continue;
                }
            },
            item = buffered.recv() => match item {
                Some(data) => data,
                None => break,
            },
        };

        let written = select! {
            biased;

            () = token.cancelled() => break,
            res = write_item(&mut writer, &data) => res,
        };
        if let Err(e) = written {
            metrics::inc_errors();
            warn!(
                "write failed: id={}, peer={}, error={e}",
                conn.id, conn.peer_addr
            );
            conn.stop();
            break;
        }
        metrics::inc_frames(Direction::Outbound);
    }

    drop(direct);
    drop(buffered);
    if let Err(e) = writer.shutdown().await {
        debug!("socket shutdown failed: id={}, error={e}", conn.id);
    }
}

async fn write_item(writer: &mut BoxedWriter, data: &[u8]) -> io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}
