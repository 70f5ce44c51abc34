//! Metric helpers for `linkframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper is a no-op.

/// Name of the gauge tracking running connections.
pub const CONNECTIONS_ACTIVE: &str = "linkframe_connections_active";
/// Name of the counter tracking frames read and writes performed.
pub const FRAMES_PROCESSED: &str = "linkframe_frames_processed_total";
/// Name of the counter tracking connection and handler errors.
pub const ERRORS_TOTAL: &str = "linkframe_errors_total";
/// Name of the counter tracking heartbeat expiries.
pub const HEARTBEAT_EXPIRED: &str = "linkframe_heartbeat_expired_total";
/// Name of the counter tracking sockets rejected by the connection limit.
pub const CONNECTIONS_REJECTED: &str = "linkframe_connections_rejected_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Inbound frames received from a client.
    Inbound,
    /// Outbound data written to a client.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[cfg(feature = "metrics")]
mod imp {
    use metrics::{counter, gauge};

    use super::*;

    pub fn inc_connections() { gauge!(CONNECTIONS_ACTIVE).increment(1.0); }

    pub fn dec_connections() { gauge!(CONNECTIONS_ACTIVE).decrement(1.0); }

    pub fn inc_frames(direction: Direction) {
        counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    }

    pub fn inc_errors() { counter!(ERRORS_TOTAL).increment(1); }

    pub fn inc_heartbeat_expired() { counter!(HEARTBEAT_EXPIRED).increment(1); }

    pub fn inc_rejected() { counter!(CONNECTIONS_REJECTED).increment(1); }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    use super::Direction;

    pub fn inc_connections() {}

    pub fn dec_connections() {}

    pub fn inc_frames(_direction: Direction) {}

    pub fn inc_errors() {}

    pub fn inc_heartbeat_expired() {}

    pub fn inc_rejected() {}
}

/// Increment the running connections gauge.
pub fn inc_connections() { imp::inc_connections(); }

/// Decrement the running connections gauge.
pub fn dec_connections() { imp::dec_connections(); }

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) { imp::inc_frames(direction); }

/// Record an error occurrence.
pub fn inc_errors() { imp::inc_errors(); }

/// Record a heartbeat expiry.
pub fn inc_heartbeat_expired() { imp::inc_heartbeat_expired(); }

/// Record a socket rejected by the connection limit.
pub fn inc_rejected() { imp::inc_rejected(); }
