//! Heartbeat monitor.
//!
//! Waits for pulses recorded by [`Connection::pulse_heartbeat`] and reports
//! each wait's outcome to the on-heartbeat hook. The monitor never closes the
//! connection; applications decide what an expiry means.

use std::{sync::Arc, time::Duration};

use log::debug;
use tokio::{select, time::sleep};

use super::Connection;
use crate::{hooks::HeartbeatStatus, metrics};

pub(super) async fn run(conn: Arc<Connection>, timeout: Duration) {
    let token = conn.shutdown.clone();
    loop {
        let status = select! {
            biased;

            () = token.cancelled() => HeartbeatStatus::ClosedByShutdown,
            () = conn.heartbeat.notified() => HeartbeatStatus::Alive,
            () = sleep(timeout) => HeartbeatStatus::Expired,
        };
        if status == HeartbeatStatus::Expired {
            metrics::inc_heartbeat_expired();
            debug!(
                "heartbeat expired: id={}, peer={}, timeout={timeout:?}",
                conn.id, conn.peer_addr
            );
        }
        conn.hooks.run_heartbeat(&conn, status);
        if status == HeartbeatStatus::ClosedByShutdown {
            break;
        }
    }
}
