//! Server configuration.
//!
//! [`ServerConfig`] is the file-facing configuration, loaded from JSON. The
//! runtime derives narrower views from it: [`ConnectionConfig`] for each
//! connection and [`DispatchConfig`] for the worker pool.

use std::{fs, io, path::Path, sync::Arc, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::codec::{CompactCodec, MAX_PAYLOAD_LEN, WireCodec};

/// Errors raised while loading a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The contents are not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for one server, as read from a JSON file.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
///
/// # Examples
///
/// ```
/// use linkframe::ServerConfig;
///
/// let config = ServerConfig::from_json_str(r#"{ "tcp_port": 9000, "heartbeat": true }"#)
///     .expect("valid json");
/// assert_eq!(config.tcp_port, 9000);
/// assert_eq!(config.max_conn, 12_000);
/// assert!(config.connection_config().heartbeat.is_some());
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Name used in log lines.
    pub name: String,
    /// Address to listen on.
    pub host: String,
    /// Port to listen on.
    pub tcp_port: u16,
    /// Maximum number of live connections; further sockets are rejected.
    pub max_conn: usize,
    /// Largest accepted payload, in bytes.
    pub max_packet_size: usize,
    /// Number of handler workers. Zero runs each request on its own task.
    pub worker_pool_size: usize,
    /// Capacity of each worker's queue.
    pub max_worker_task_len: usize,
    /// Capacity of each connection's buffered send channel.
    pub max_msg_chan_len: usize,
    /// Whether connections run a heartbeat monitor.
    pub heartbeat: bool,
    /// Heartbeat timeout in seconds.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "linkframe".to_owned(),
            host: "0.0.0.0".to_owned(),
            tcp_port: 20_000,
            max_conn: 12_000,
            max_packet_size: 4096,
            worker_pool_size: 20,
            max_worker_task_len: 1024,
            max_msg_chan_len: 1024,
            heartbeat: false,
            heartbeat_timeout_secs: 13,
        }
    }
}

impl ServerConfig {
    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `text` is not valid.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str::<Self>(text)?.normalized())
    }

    /// Clamp values the runtime cannot use.
    ///
    /// Zero capacities become 1, the packet size is capped at the 16-bit
    /// length field and a zero heartbeat timeout becomes one second.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_conn = self.max_conn.max(1);
        self.max_packet_size = self.max_packet_size.clamp(1, MAX_PAYLOAD_LEN);
        self.max_worker_task_len = self.max_worker_task_len.max(1);
        self.max_msg_chan_len = self.max_msg_chan_len.max(1);
        self.heartbeat_timeout_secs = self.heartbeat_timeout_secs.max(1);
        self
    }

    /// Listen address as `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.tcp_port) }

    /// Per-connection view.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            buffered_capacity: self.max_msg_chan_len.max(1),
            heartbeat: self
                .heartbeat
                .then(|| Duration::from_secs(self.heartbeat_timeout_secs.max(1))),
        }
    }

    /// Worker pool view.
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            worker_pool_size: self.worker_pool_size,
            max_worker_task_len: self.max_worker_task_len.max(1),
        }
    }

    /// Default codec for this configuration.
    #[must_use]
    pub fn codec(&self) -> Arc<dyn WireCodec> { Arc::new(CompactCodec::new(self.max_packet_size)) }
}

/// Settings applied to each connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Capacity of the buffered send channel.
    pub buffered_capacity: usize,
    /// Heartbeat timeout; `None` disables the monitor.
    pub heartbeat: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffered_capacity: 1024,
            heartbeat: None,
        }
    }
}

/// Settings for the handler worker pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of workers; zero disables the pool.
    pub worker_pool_size: usize,
    /// Capacity of each worker's queue.
    pub max_worker_task_len: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 20,
            max_worker_task_len: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = ServerConfig::from_json_str("{}").expect("empty object");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:20000");
        assert!(config.connection_config().heartbeat.is_none());
    }

    #[rstest]
    #[case(r#"{ "max_msg_chan_len": 0 }"#)]
    #[case(r#"{ "max_worker_task_len": 0 }"#)]
    fn zero_capacities_become_one(#[case] json: &str) {
        let config = ServerConfig::from_json_str(json).expect("valid json");
        assert!(config.connection_config().buffered_capacity >= 1);
        assert!(config.dispatch_config().max_worker_task_len >= 1);
    }

    #[test]
    fn packet_size_is_capped_at_length_field() {
        let config =
            ServerConfig::from_json_str(r#"{ "max_packet_size": 100000 }"#).expect("valid json");
        assert_eq!(config.max_packet_size, 65_535);
        assert_eq!(config.codec().max_packet_size(), 65_535);
    }

    #[test]
    fn heartbeat_uses_configured_timeout() {
        let config = ServerConfig::from_json_str(
            r#"{ "heartbeat": true, "heartbeat_timeout_secs": 5 }"#,
        )
        .expect("valid json");
        assert_eq!(
            config.connection_config().heartbeat,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ServerConfig::from_json_str(r#"{ "tcp_port": "x" }"#).expect_err("bad port");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("linkframe-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).expect("create temp config");
        file.write_all(br#"{ "name": "game", "worker_pool_size": 0 }"#)
            .expect("write temp config");
        drop(file);

        let config = ServerConfig::load(&path).expect("load config");
        fs::remove_file(&path).expect("remove temp config");
        assert_eq!(config.name, "game");
        assert_eq!(config.dispatch_config().worker_pool_size, 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ServerConfig::load("/nonexistent/linkframe.json").expect_err("no such file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
