//! Session registry implementation
//!
//! The single place in the hosting process that decides which relay owns a
//! session key. All checks go through one mutex; the critical sections are a
//! map lookup and an insert, so a blocking lock is fine here and lets the
//! lease guard release itself from `Drop`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use crate::session::SessionKey;

use super::config::RegistryConfig;
use super::entry::{Lease, LeaseEntry};
use super::error::RegistryError;

/// Registry of active relay sessions
#[derive(Debug)]
pub struct SessionRegistry {
    /// Map of session key to the lease currently holding it
    leases: Mutex<HashMap<SessionKey, LeaseEntry>>,

    /// Next lease token
    next_token: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new session registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new session registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<SessionKey, LeaseEntry>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lease on `key`.
    ///
    /// Fails while another relay holds a live lease. A lease whose holder
    /// stopped heartbeating for longer than the TTL is taken over.
    pub fn try_acquire(self: &Arc<Self>, key: &SessionKey) -> Result<Lease, RegistryError> {
        let mut leases = self.leases();

        if let Some(entry) = leases.get(key) {
            if !entry.is_expired(self.config.lease_ttl) {
                tracing::debug!(session = %key, token = entry.token, "Session lease held");
                return Err(RegistryError::SessionActive(key.clone()));
            }

            tracing::warn!(
                session = %key,
                token = entry.token,
                silent_for_ms = entry.last_heartbeat.elapsed().as_millis() as u64,
                "Reclaiming abandoned session lease"
            );
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        leases.insert(key.clone(), LeaseEntry::new(token));

        tracing::info!(session = %key, token = token, "Session lease acquired");

        Ok(Lease::new(Arc::clone(self), key.clone(), token))
    }

    /// Refresh the lease identified by `token`
    pub(super) fn heartbeat(&self, key: &SessionKey, token: u64) -> bool {
        match self.leases().get_mut(key) {
            Some(entry) if entry.token == token => {
                entry.last_heartbeat = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Check whether `token` still holds `key`
    pub(super) fn holds(&self, key: &SessionKey, token: u64) -> bool {
        self.leases()
            .get(key)
            .is_some_and(|entry| entry.token == token)
    }

    /// Check whether a holder other than `token` has taken `key` over.
    ///
    /// A purged lease is not superseded: nobody else owns the key.
    pub(super) fn superseded(&self, key: &SessionKey, token: u64) -> bool {
        self.leases()
            .get(key)
            .is_some_and(|entry| entry.token != token)
    }

    /// Drop the lease identified by `token`, if it still holds the key
    pub(super) fn release(&self, key: &SessionKey, token: u64) {
        let mut leases = self.leases();

        match leases.get(key).map(|entry| (entry.token, entry.acquired_at)) {
            Some((holder, acquired_at)) if holder == token => {
                leases.remove(key);
                tracing::info!(
                    session = %key,
                    token = token,
                    held_ms = acquired_at.elapsed().as_millis() as u64,
                    "Session lease released"
                );
            }
            Some((holder, _)) => {
                tracing::warn!(
                    session = %key,
                    expected = token,
                    actual = holder,
                    "Lease release mismatch, leaving successor in place"
                );
            }
            None => {}
        }
    }

    /// Check if a live lease exists for `key`
    pub fn is_active(&self, key: &SessionKey) -> bool {
        self.leases()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.config.lease_ttl))
    }

    /// Keys with a live lease
    pub fn active_sessions(&self) -> Vec<SessionKey> {
        let ttl = self.config.lease_ttl;
        self.leases()
            .iter()
            .filter(|(_, entry)| !entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of leases, live or not yet purged
    pub fn lease_count(&self) -> usize {
        self.leases().len()
    }

    /// Remove expired leases. Returns how many were purged.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.lease_ttl;
        let mut leases = self.leases();
        let before = leases.len();

        leases.retain(|key, entry| {
            let expired = entry.is_expired(ttl);
            if expired {
                tracing::info!(session = %key, token = entry.token, "Purging expired session lease");
            }
            !expired
        });

        before - leases.len()
    }

    /// Spawn a background task that purges expired leases periodically
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.purge_expired();
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key() -> SessionKey {
        SessionKey::new("alice", "cam1").unwrap()
    }

    #[tokio::test]
    async fn test_second_acquire_fails_while_held() {
        let registry = Arc::new(SessionRegistry::new());

        let lease = registry.try_acquire(&key()).unwrap();
        assert!(registry.is_active(&key()));

        let err = registry.try_acquire(&key()).unwrap_err();
        assert_eq!(err, RegistryError::SessionActive(key()));

        drop(lease);
        assert!(!registry.is_active(&key()));
        assert!(registry.try_acquire(&key()).is_ok());
    }

    #[tokio::test]
    async fn test_independent_keys() {
        let registry = Arc::new(SessionRegistry::new());
        let other = SessionKey::new("bob", "cam1").unwrap();

        let _a = registry.try_acquire(&key()).unwrap();
        let _b = registry.try_acquire(&other).unwrap();

        let mut active = registry.active_sessions();
        active.sort_by_key(|k| k.to_string());
        assert_eq!(active, vec![key(), other]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_lease_alive() {
        let config = RegistryConfig::default().lease_ttl(Duration::from_secs(5));
        let registry = Arc::new(SessionRegistry::with_config(config));
        let lease = registry.try_acquire(&key()).unwrap();

        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(3)).await;
            assert!(lease.heartbeat());
        }

        assert!(registry.try_acquire(&key()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_lease_is_reclaimed() {
        let config = RegistryConfig::default().lease_ttl(Duration::from_secs(5));
        let registry = Arc::new(SessionRegistry::with_config(config));
        let stale = registry.try_acquire(&key()).unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!registry.is_active(&key()));

        let fresh = registry.try_acquire(&key()).unwrap();
        assert_ne!(stale.token(), fresh.token());

        // The old holder lost its lease and cannot release the new one
        assert!(stale.is_superseded());
        assert!(!fresh.is_superseded());
        assert!(!stale.heartbeat());
        drop(stale);
        assert!(registry.is_active(&key()));
        assert!(fresh.heartbeat());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let config = RegistryConfig::default().lease_ttl(Duration::from_secs(5));
        let registry = Arc::new(SessionRegistry::with_config(config));
        let lease = registry.try_acquire(&key()).unwrap();

        assert_eq!(registry.purge_expired(), 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(registry.purge_expired(), 1);
        assert_eq!(registry.lease_count(), 0);

        // Purged, but nobody else holds the key
        assert!(!lease.is_held());
        assert!(!lease.is_superseded());

        // Releasing a purged lease is a no-op
        drop(lease);
        assert_eq!(registry.lease_count(), 0);
    }
}
