//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::{Bound, Server};
use crate::{
    codec::{CompactCodec, WireCodec},
    config::ServerConfig,
    dispatch::Router,
    frame::Frame,
    request::Request,
};

/// Message identifier echoed back by [`echo_router`].
pub const ECHO_ID: u16 = 1;

#[fixture]
pub fn echo_router() -> Router {
    Router::new()
        .route(ECHO_ID, |req: Request| async move {
            let _ = req
                .connection()
                .send_message(req.msg_id(), req.data().clone())
                .await;
        })
        .expect("echo route")
}

#[fixture]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        worker_pool_size: 2,
        max_worker_task_len: 8,
        max_msg_chan_len: 8,
        ..ServerConfig::default()
    }
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents races where another process could
/// claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server(config: ServerConfig, router: Router, listener: StdTcpListener) -> Server<Bound> {
    Server::new(config, router)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

pub async fn write_frame(stream: &mut TcpStream, id: u16, payload: &[u8]) {
    let frame = Frame::new(id, payload.to_vec()).expect("payload fits");
    let bytes = CompactCodec::default().encode(&frame).expect("encode frame");
    stream.write_all(&bytes).await.expect("write frame");
}

pub async fn read_frame(stream: &mut TcpStream) -> Frame {
    let codec = CompactCodec::default();
    let mut head = [0_u8; CompactCodec::HEAD_SIZE];
    stream.read_exact(&mut head).await.expect("read head");
    let head = codec.decode_head(&head).expect("decode head");
    let mut body = vec![0_u8; head.payload_len()];
    stream.read_exact(&mut body).await.expect("read body");
    codec.decode_body(head, body.into()).expect("decode body")
}
