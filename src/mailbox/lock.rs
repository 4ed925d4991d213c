//! Scoped advisory file locks
//!
//! Every access to a mailbox or control file happens while one of these
//! guards is alive. The lock is released when the guard drops, so a failed
//! read or parse can never leave the file locked.

use std::fs::File;
use std::io;
use std::ops::Deref;

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers
    Shared,
    /// One writer, no readers
    Exclusive,
}

/// Advisory lock held on an open file for the lifetime of the guard
#[derive(Debug)]
pub struct FileLock<'a> {
    file: &'a File,
    mode: LockMode,
}

impl<'a> FileLock<'a> {
    /// Block until a shared lock is held
    pub fn shared(file: &'a File) -> io::Result<Self> {
        file.lock_shared()?;
        Ok(Self {
            file,
            mode: LockMode::Shared,
        })
    }

    /// Block until an exclusive lock is held
    pub fn exclusive(file: &'a File) -> io::Result<Self> {
        file.lock()?;
        Ok(Self {
            file,
            mode: LockMode::Exclusive,
        })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Deref for FileLock<'_> {
    type Target = File;

    fn deref(&self) -> &File {
        self.file
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(error = %e, mode = ?self.mode, "Failed to release file lock");
        }
    }
}
