//! Registry configuration

use std::time::Duration;

/// Session registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// A lease not heartbeated for this long is considered abandoned
    pub lease_ttl: Duration,

    /// How often the cleanup task purges abandoned leases
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Set the lease time-to-live
    pub fn lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
