//! Tests for server runtime behaviour.

use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rstest::rstest;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::yield_now,
    time::{Duration, Instant, advance, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    AcceptLoopOptions,
    BackoffConfig,
    accept::{AcceptListener, ConnectionIds},
    accept_loop,
};
use crate::{
    config::ServerConfig,
    connection::ConnectionId,
    dispatch::Router,
    manager::ConnManager,
    server::test_util::{
        ECHO_ID,
        bind_server,
        echo_router,
        free_listener,
        read_frame,
        test_config,
        write_frame,
    },
    test_helpers::context,
};

fn options(shutdown: &CancellationToken, backoff: BackoffConfig) -> AcceptLoopOptions {
    AcceptLoopOptions {
        ctx: context(Router::new()),
        manager: Arc::new(ConnManager::new()),
        max_conn: 8,
        shutdown: shutdown.clone(),
        backoff,
    }
}

#[rstest]
#[tokio::test]
async fn run_with_immediate_shutdown(test_config: ServerConfig, free_listener: std::net::TcpListener) {
    let server = bind_server(test_config, Router::new(), free_listener);
    let shutdown_future = async { tokio::time::sleep(Duration::from_millis(10)).await };
    let result = timeout(
        Duration::from_millis(1000),
        server.run_with_shutdown(shutdown_future),
    )
    .await;
    assert!(result.expect("server did not finish in time").is_ok());
}

#[rstest]
#[tokio::test]
async fn ready_signal_fires_before_shutdown(
    test_config: ServerConfig,
    free_listener: std::net::TcpListener,
) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = bind_server(test_config, Router::new(), free_listener).ready_signal(ready_tx);
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    timeout(Duration::from_secs(1), ready_rx)
        .await
        .expect("ready signal timed out")
        .expect("ready sender dropped");
    let _ = stop_tx.send(());
    handle
        .await
        .expect("server join error")
        .expect("server run failed");
}

#[rstest]
#[tokio::test]
async fn accepted_connections_are_served_and_stopped(
    test_config: ServerConfig,
    echo_router: Router,
    free_listener: std::net::TcpListener,
) {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = bind_server(test_config, echo_router, free_listener);
    let addr = server.local_addr().expect("bound address");
    let manager = server.connections();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));

    let mut client = TcpStream::connect(addr).await.expect("connect");
    write_frame(&mut client, ECHO_ID, b"hello").await;
    let frame = timeout(Duration::from_secs(1), read_frame(&mut client))
        .await
        .expect("echo in time");
    assert_eq!(frame.payload().as_ref(), b"hello");
    assert_eq!(manager.len(), 1);

    let _ = stop_tx.send(());
    handle
        .await
        .expect("server join error")
        .expect("server run failed");
    assert!(manager.is_empty());
}

#[rstest]
#[tokio::test]
async fn worker_pool_disabled_still_shuts_down(free_listener: std::net::TcpListener) {
    let config = ServerConfig {
        worker_pool_size: 0,
        ..ServerConfig::default()
    };
    let server = bind_server(config, Router::new(), free_listener);
    let result = timeout(
        Duration::from_millis(1000),
        server.run_with_shutdown(async {}),
    )
    .await;
    assert!(result.expect("server did not finish in time").is_ok());
}

#[tokio::test]
async fn accept_loop_stops_on_cancel() {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let listener = Arc::new(
        TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener"),
    );

    tracker.spawn(accept_loop(
        listener,
        options(&token, BackoffConfig::default()),
    ));

    token.cancel();
    tracker.close();

    let result = timeout(Duration::from_millis(100), tracker.wait()).await;
    assert!(result.is_ok());
}

/// Listener whose every `accept` fails, recording when it was called.
struct FailingListener {
    calls: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl AcceptListener for FailingListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.calls.lock().expect("lock").push(Instant::now());
        Err(io::Error::other("accept failed"))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

#[tokio::test(start_paused = true)]
async fn accept_errors_back_off_exponentially() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(FailingListener {
        calls: Arc::clone(&calls),
    });
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };

    tracker.spawn(accept_loop(listener, options(&token, backoff)));
    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    token.cancel();
    tracker.close();
    tracker.wait().await;

    let calls = calls.lock().expect("lock");
    let intervals: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        intervals,
        [5, 10, 20, 20].map(Duration::from_millis).to_vec()
    );
}

#[test]
fn connection_ids_skip_zero() {
    let ids = ConnectionIds::default();
    assert_eq!(ids.next(), ConnectionId::new(1));
    assert_eq!(ids.next(), ConnectionId::new(2));

    let wrapped = ConnectionIds(std::sync::atomic::AtomicU32::new(u32::MAX));
    assert_eq!(wrapped.next(), ConnectionId::new(u32::MAX));
    assert_eq!(wrapped.next(), ConnectionId::new(1));
}
