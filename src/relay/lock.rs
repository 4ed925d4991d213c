//! Exclusivity lock
//!
//! Two layers guard a session key:
//!
//! - the in-process [`SessionRegistry`] lease, which serialises relays of this
//!   process and expires if its holder stops heartbeating;
//! - the mailbox file itself, created with create-new semantics, which tells
//!   other processes on the host that the key is being served.
//!
//! Neither layer is a transactional lock across hosts sharing the same
//! storage. The guard releases both on drop, on every exit path of the relay.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::registry::{Lease, SessionRegistry};
use crate::session::SessionKey;

/// Result of one lock heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// Lease refreshed, marker touched
    Held,
    /// Lease expired or was taken over
    LeaseLost,
    /// The marker was removed from outside
    MarkerGone,
}

/// Held exclusivity on one session key
#[derive(Debug)]
pub struct ExclusivityLock {
    mailbox: Mailbox,
    lease: Lease,
    /// Cleared once the marker is seen removed; it may belong to someone else then
    owns_marker: AtomicBool,
}

impl ExclusivityLock {
    /// Take the lease and create the on-disk marker.
    ///
    /// An existing marker is a [`Error::StartupConflict`] and is left
    /// untouched, unless `stale_after` is set and the marker has not been
    /// modified for that long.
    pub fn acquire(
        registry: &Arc<SessionRegistry>,
        key: &SessionKey,
        mailbox: Mailbox,
        stale_after: Option<Duration>,
    ) -> Result<Self> {
        let lease = registry.try_acquire(key)?;

        match mailbox.create() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !reclaim_stale_marker(key, &mailbox, stale_after)? {
                    tracing::error!(
                        session = %key,
                        marker = %mailbox.path().display(),
                        "Mailbox already exists, concurrent relay cannot be started"
                    );
                    return Err(Error::StartupConflict(key.clone()));
                }
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(session = %key, marker = %mailbox.path().display(), "Exclusivity lock held");

        Ok(Self {
            mailbox,
            lease,
            owns_marker: AtomicBool::new(true),
        })
    }

    pub fn key(&self) -> &SessionKey {
        self.lease.key()
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Refresh the lease and the marker's modification time
    pub fn heartbeat(&self) -> LockStatus {
        if !self.lease.heartbeat() {
            return LockStatus::LeaseLost;
        }

        match self.mailbox.touch() {
            Ok(()) => LockStatus::Held,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.owns_marker.store(false, Ordering::Release);
                tracing::warn!(session = %self.key(), "Mailbox marker removed from outside");
                LockStatus::MarkerGone
            }
            Err(e) => {
                tracing::debug!(session = %self.key(), error = %e, "Failed to touch mailbox marker");
                LockStatus::Held
            }
        }
    }
}

impl Drop for ExclusivityLock {
    fn drop(&mut self) {
        // A successor that reclaimed the key owns the marker now
        if self.lease.is_superseded() {
            tracing::warn!(session = %self.key(), "Lease taken over, leaving mailbox marker in place");
            return;
        }
        if !self.owns_marker.load(Ordering::Acquire) {
            tracing::debug!(session = %self.key(), "Mailbox marker already gone");
            return;
        }

        match self.mailbox.remove() {
            Ok(()) => tracing::info!(session = %self.key(), "Removed mailbox marker"),
            Err(e) => tracing::error!(
                session = %self.key(),
                error = %e,
                "Failed to remove mailbox marker"
            ),
        }
        // The lease field drops after this, releasing the registry entry
    }
}

fn reclaim_stale_marker(
    key: &SessionKey,
    mailbox: &Mailbox,
    stale_after: Option<Duration>,
) -> Result<bool> {
    let Some(max_age) = stale_after else {
        return Ok(false);
    };

    let age = match mailbox.age() {
        Ok(age) => age,
        // Removed between our create and stat: try again once
        Err(e) if e.kind() == io::ErrorKind::NotFound => Duration::MAX,
        Err(e) => return Err(e.into()),
    };
    if age < max_age {
        return Ok(false);
    }

    tracing::warn!(
        session = %key,
        age_secs = age.as_secs(),
        "Reclaiming stale mailbox marker"
    );
    mailbox.remove()?;

    match mailbox.create() {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::FrameRef;
    use std::fs;

    fn key() -> SessionKey {
        SessionKey::new("alice", "cam1").unwrap()
    }

    #[test]
    fn test_acquire_creates_empty_marker_and_drop_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());

        let lock = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        assert!(mailbox.exists());
        assert_eq!(fs::metadata(mailbox.path()).unwrap().len(), 0);
        assert!(registry.is_active(&key()));
        assert_eq!(lock.heartbeat(), LockStatus::Held);

        drop(lock);
        assert!(!mailbox.exists());
        assert!(!registry.is_active(&key()));
    }

    #[test]
    fn test_existing_marker_is_conflict_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());
        fs::write(mailbox.path(), "pending.jpg\n").unwrap();

        let err = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap_err();

        assert!(matches!(err, Error::StartupConflict(_)));
        assert_eq!(fs::read_to_string(mailbox.path()).unwrap(), "pending.jpg\n");
        assert!(!registry.is_active(&key()));
    }

    #[test]
    fn test_held_lease_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());

        let _held = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        mailbox.append(&FrameRef::new("a.jpg")).unwrap();

        let err = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap_err();
        assert!(matches!(err, Error::StartupConflict(_)));

        // The first holder's mailbox is intact
        assert_eq!(mailbox.drain_all().unwrap(), vec![FrameRef::new("a.jpg")]);
    }

    #[test]
    fn test_stale_marker_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());
        fs::write(mailbox.path(), "left-behind.jpg\n").unwrap();

        let old = std::time::SystemTime::now() - Duration::from_secs(600);
        fs::File::options()
            .write(true)
            .open(mailbox.path())
            .unwrap()
            .set_modified(old)
            .unwrap();

        let lock = ExclusivityLock::acquire(
            &registry,
            &key(),
            mailbox.clone(),
            Some(Duration::from_secs(60)),
        )
        .unwrap();

        assert!(mailbox.drain_all().unwrap().is_empty());
        drop(lock);
        assert!(!mailbox.exists());
    }

    #[test]
    fn test_fresh_marker_is_not_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());
        mailbox.create().unwrap();

        let result = ExclusivityLock::acquire(
            &registry,
            &key(),
            mailbox.clone(),
            Some(Duration::from_secs(60)),
        );

        assert!(matches!(result, Err(Error::StartupConflict(_))));
        assert!(mailbox.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purged_lease_still_removes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());

        let lock = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(registry.purge_expired(), 1);
        assert_eq!(lock.heartbeat(), LockStatus::LeaseLost);

        drop(lock);
        assert!(!mailbox.exists());

        // The key is free for the next relay
        let next = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        drop(next);
        assert!(!mailbox.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_taken_over_lease_leaves_marker() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());

        let lock = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        let successor = registry.try_acquire(&key()).unwrap();

        drop(lock);
        assert!(mailbox.exists());
        assert!(successor.is_held());
    }

    #[test]
    fn test_removed_marker_is_reported_and_not_deleted_again() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let mailbox = Mailbox::new(dir.path(), &key());

        let lock = ExclusivityLock::acquire(&registry, &key(), mailbox.clone(), None).unwrap();
        mailbox.remove().unwrap();
        assert_eq!(lock.heartbeat(), LockStatus::MarkerGone);

        // Another process creates its own marker before we let go
        mailbox.create().unwrap();
        drop(lock);

        assert!(mailbox.exists());
        assert!(!registry.is_active(&key()));
    }
}
