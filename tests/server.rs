//! Server tests over loopback TCP.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use linkframe::{CompactCodec, ConnManager, Router, Server, ServerConfig, ServerError};
use linkframe_testing::{echo_router, read_frame, recv_expect, unused_listener, write_frame};
use rstest::rstest;
use tokio::{
    io::AsyncReadExt,
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
    time::{sleep, timeout},
};

const WAIT: Duration = Duration::from_secs(2);

struct Running {
    addr: std::net::SocketAddr,
    connections: Arc<ConnManager>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

async fn spawn_server(server: Server) -> Running {
    let listener = unused_listener().expect("free port");
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop, stop_rx) = oneshot::channel::<()>();
    let server = server
        .ready_signal(ready_tx)
        .bind_existing_listener(listener)
        .expect("bind");
    let addr = server.local_addr().expect("bound address");
    let connections = server.connections();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));
    timeout(WAIT, ready_rx)
        .await
        .expect("ready in time")
        .expect("ready sender kept");
    Running {
        addr,
        connections,
        stop,
        handle,
    }
}

async fn wait_for_len(connections: &ConnManager, len: usize) {
    timeout(WAIT, async {
        while connections.len() != len {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection count settles");
}

#[rstest]
#[case(0)]
#[case(3)]
#[tokio::test]
async fn echoes_over_tcp(echo_router: Router, #[case] workers: usize) {
    let config = ServerConfig {
        worker_pool_size: workers,
        ..ServerConfig::default()
    };
    let running = spawn_server(Server::new(config, echo_router)).await;
    let codec = CompactCodec::default();

    let mut client = TcpStream::connect(running.addr).await.expect("connect");
    for n in 0..5_u8 {
        write_frame(&mut client, &codec, 1, &[n; 3])
            .await
            .expect("write");
        let frame = recv_expect!(timeout(WAIT, read_frame(&mut client, &codec))).expect("echo");
        assert_eq!(frame.id(), 1);
        assert_eq!(frame.payload().as_ref(), [n; 3]);
    }

    let _ = running.stop.send(());
    running
        .handle
        .await
        .expect("server task")
        .expect("server run");
}

#[rstest]
#[tokio::test]
async fn rejects_connections_over_the_limit(echo_router: Router) {
    let config = ServerConfig {
        max_conn: 1,
        ..ServerConfig::default()
    };
    let running = spawn_server(Server::new(config, echo_router)).await;

    let _first = TcpStream::connect(running.addr).await.expect("connect");
    wait_for_len(&running.connections, 1).await;

    let mut second = TcpStream::connect(running.addr).await.expect("connect");
    let mut buf = [0_u8; 1];
    let read = timeout(WAIT, second.read(&mut buf))
        .await
        .expect("rejected socket closes");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(running.connections.len(), 1);

    let _ = running.stop.send(());
    running
        .handle
        .await
        .expect("server task")
        .expect("server run");
}

#[rstest]
#[tokio::test]
async fn shutdown_stops_live_connections(echo_router: Router) {
    let stops = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&stops);
    let server = Server::new(ServerConfig::default(), echo_router).on_connection_stop(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let running = spawn_server(server).await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(running.addr).await.expect("connect"));
    }
    wait_for_len(&running.connections, 3).await;

    let _ = running.stop.send(());
    timeout(WAIT, running.handle)
        .await
        .expect("shutdown in time")
        .expect("server task")
        .expect("server run");

    assert_eq!(stops.load(Ordering::SeqCst), 3);
    assert!(running.connections.is_empty());
    for client in &mut clients {
        let mut buf = [0_u8; 1];
        let read = timeout(WAIT, client.read(&mut buf)).await.expect("eof");
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}

#[rstest]
#[tokio::test]
async fn connections_get_distinct_ids(echo_router: Router) {
    let running = spawn_server(Server::new(ServerConfig::default(), echo_router)).await;
    let _a = TcpStream::connect(running.addr).await.expect("connect");
    let _b = TcpStream::connect(running.addr).await.expect("connect");
    wait_for_len(&running.connections, 2).await;

    let mut ids = running.connections.ids();
    ids.sort();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| id.as_u32() != 0));

    let _ = running.stop.send(());
    running
        .handle
        .await
        .expect("server task")
        .expect("server run");
}
