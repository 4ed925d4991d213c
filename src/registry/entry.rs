//! Lease entries and the lease guard

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::session::SessionKey;

use super::store::SessionRegistry;

/// Registry record for one held session key
#[derive(Debug, Clone)]
pub struct LeaseEntry {
    /// Identifies the holder; a reclaimed key gets a new token
    pub token: u64,

    /// When the lease was granted
    pub acquired_at: Instant,

    /// Last time the holder proved it was alive
    pub last_heartbeat: Instant,
}

impl LeaseEntry {
    pub(super) fn new(token: u64) -> Self {
        let now = Instant::now();
        Self {
            token,
            acquired_at: now,
            last_heartbeat: now,
        }
    }

    /// Check whether the holder has gone quiet for longer than `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_heartbeat.elapsed() > ttl
    }
}

/// Held lease on a session key
///
/// Dropping the guard releases the key. Release is token-checked, so a lease
/// that expired and was handed to another relay is left alone.
#[derive(Debug)]
pub struct Lease {
    registry: Arc<SessionRegistry>,
    key: SessionKey,
    token: u64,
}

impl Lease {
    pub(super) fn new(registry: Arc<SessionRegistry>, key: SessionKey, token: u64) -> Self {
        Self {
            registry,
            key,
            token,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Check that no other holder has taken the key over
    pub fn is_held(&self) -> bool {
        self.registry.holds(&self.key, self.token)
    }

    /// Check whether another holder has taken the key over since
    pub fn is_superseded(&self) -> bool {
        self.registry.superseded(&self.key, self.token)
    }

    /// Refresh the lease. Returns false if it expired or was taken over.
    pub fn heartbeat(&self) -> bool {
        self.registry.heartbeat(&self.key, self.token)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.token);
    }
}
