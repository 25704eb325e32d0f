//! Server configuration
//!
//! There is no configuration file; settings come from built-in defaults
//! overlaid with `MINIWEB_`-prefixed environment variables
//! (`MINIWEB_PORT=9000`, `MINIWEB_ACCESS_LOG=false`, ...). Host and port
//! are usually overridden again by the `App::run` arguments.

use crate::error::FrameworkError;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host; empty means all interfaces.
    pub host: String,
    pub port: u16,
    /// Tokio worker threads; `None` uses the CPU count.
    pub workers: Option<usize>,
    pub keep_alive: bool,
    /// Per-connection timeout in seconds.
    pub connection_timeout: u64,
    pub access_log: bool,
    pub max_connections: Option<u64>,
}

impl ServerConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("MINIWEB"))
            .set_default("host", "")?
            .set_default("port", 8080)?
            .set_default("keep_alive", true)?
            .set_default("connection_timeout", 30)?
            .set_default("access_log", true)?
            .build()?;

        settings.try_deserialize()
    }

    /// Resolve the bind address, mapping the empty host to all interfaces.
    pub fn socket_addr(&self) -> Result<SocketAddr, FrameworkError> {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        };
        let addr = format!("{host}:{}", self.port);
        addr.parse().map_err(|e| FrameworkError::InvalidAddress {
            addr,
            reason: format!("{e}"),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
            workers: None,
            keep_alive: true,
            connection_timeout: 30,
            access_log: true,
            max_connections: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.host.is_empty());
        assert!(config.keep_alive);
        assert!(config.workers.is_none());
        assert!(config.max_connections.is_none());
    }

    #[test]
    fn test_empty_host_binds_all_interfaces() {
        let config = ServerConfig::default();
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_explicit_host() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_host_is_an_error() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.socket_addr().unwrap_err(),
            FrameworkError::InvalidAddress { .. }
        ));
    }
}
