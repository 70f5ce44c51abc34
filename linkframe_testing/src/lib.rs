//! Utilities for exercising `linkframe` connections in tests.
//!
//! Connections run over `tokio::io::duplex` pipes or loopback sockets; the
//! helpers here write and read frames on the peer side and record what the
//! server did through its hooks and registry.
//!
//! ```rust
//! use linkframe::{CompactCodec, Router};
//! use linkframe_testing::{TestContext, read_frame, write_frame};
//!
//! # async fn example() -> std::io::Result<()> {
//! let ctx = TestContext::new(Router::new());
//! let (conn, mut client) = ctx.duplex_connection(1);
//! conn.start().expect("fresh connection");
//! write_frame(&mut client, &CompactCodec::default(), 1, b"hi").await?;
//! # let _ = read_frame(&mut client, &CompactCodec::default()).await;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod logging;
pub mod macros;
pub mod recording;
pub mod wire;

pub use context::{ECHO_ID, TestContext, echo_router, peer, unused_listener};
pub use logging::{LoggerHandle, logger};
pub use recording::{CountingRegistry, HookEvent, RecordingHooks};
pub use wire::{encode_frame, read_frame, write_frame};
