//! Relay configuration

use std::path::PathBuf;
use std::time::Duration;

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory holding mailbox and control files
    pub mailbox_dir: PathBuf,

    /// Base directory for relative frame references
    pub frame_root: PathBuf,

    /// Time between poll cycles; also caps the frame rate
    pub poll_interval: Duration,

    /// Local FIFO capacity; the oldest references are dropped beyond it
    pub max_buffered_frames: usize,

    /// Parts queued towards the HTTP body before the relay waits
    pub channel_capacity: usize,

    /// Reclaim an on-disk marker not refreshed for this long (None = never)
    pub stale_marker_after: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mailbox_dir: PathBuf::from("files/sock"),
            frame_root: PathBuf::from("."),
            poll_interval: Duration::from_secs(1),
            max_buffered_frames: 256,
            channel_capacity: 2,
            stale_marker_after: None,
        }
    }
}

impl RelayConfig {
    /// Set the mailbox directory
    pub fn mailbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mailbox_dir = dir.into();
        self
    }

    /// Set the base directory for relative frame references
    pub fn frame_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frame_root = dir.into();
        self
    }

    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the local buffer capacity (at least one frame)
    pub fn max_buffered_frames(mut self, max: usize) -> Self {
        self.max_buffered_frames = max.max(1);
        self
    }

    /// Set the body channel capacity (at least one part)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Reclaim abandoned on-disk markers older than `age`
    pub fn stale_marker_after(mut self, age: Duration) -> Self {
        self.stale_marker_after = Some(age);
        self
    }
}
