//! Connection lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Connection`](super::Connection).
///
/// Transitions only move forward: `Created → Running → Closing → Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Constructed; no loop is running yet.
    #[default]
    Created,
    /// Loops are running.
    Running,
    /// `stop` is tearing the connection down.
    Closing,
    /// Fully stopped.
    Closed,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}
