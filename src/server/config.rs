//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::RegistryConfig;
use crate::relay::RelayConfig;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent streaming sessions (0 = unlimited)
    pub max_connections: usize,

    /// Settings handed to every relay
    pub relay: RelayConfig,

    /// Session registry settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            relay: RelayConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum concurrent streaming sessions
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Replace the relay settings
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Replace the registry settings
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set the mailbox directory
    pub fn mailbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.relay = self.relay.mailbox_dir(dir);
        self
    }

    /// Set the directory relative frame references resolve against
    pub fn frame_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.relay = self.relay.frame_root(dir);
        self
    }

    /// Set the relay poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.relay = self.relay.poll_interval(interval);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.relay.poll_interval, Duration::from_secs(1));
        assert_eq!(config.registry.lease_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8081);
    }

    #[test]
    fn test_builder_max_connections() {
        let config = ServerConfig::default().max_connections(4);

        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn test_relay_shortcuts() {
        let config = ServerConfig::default()
            .mailbox_dir("/var/spool/mjpeg")
            .frame_root("/srv/frames")
            .poll_interval(Duration::from_millis(200));

        assert_eq!(config.relay.mailbox_dir, PathBuf::from("/var/spool/mjpeg"));
        assert_eq!(config.relay.frame_root, PathBuf::from("/srv/frames"));
        assert_eq!(config.relay.poll_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(10)
            .relay(RelayConfig::default().max_buffered_frames(8))
            .registry(RegistryConfig::default().lease_ttl(Duration::from_secs(5)));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.relay.max_buffered_frames, 8);
        assert_eq!(config.registry.lease_ttl, Duration::from_secs(5));
    }
}
