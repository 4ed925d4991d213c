//! Statistics for relay sessions

use std::time::{Duration, Instant};

/// Per-relay counters, reported when the relay stops
#[derive(Debug, Clone)]
pub struct RelayStats {
    /// Poll cycles run
    pub cycles: u64,
    /// Frame references taken out of the mailbox
    pub refs_drained: u64,
    /// Multipart parts written to the viewer
    pub frames_sent: u64,
    /// References whose bytes could not be read
    pub frames_skipped: u64,
    /// Buffered references thrown away (overflow or stop)
    pub frames_discarded: u64,
    /// Payload bytes written, including part headers
    pub bytes_sent: u64,
    /// Control polls that returned an unusable document
    pub control_warnings: u64,
    /// When the relay started
    pub started_at: Instant,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            refs_drained: 0,
            frames_sent: 0,
            frames_skipped: 0,
            frames_discarded: 0,
            bytes_sent: 0,
            control_warnings: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one written part of `len` bytes
    pub fn record_sent(&mut self, len: usize) {
        self.frames_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Get duration since the relay started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Frames sent per second of relay lifetime
    pub fn frame_rate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames_sent as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_stats_new() {
        let stats = RelayStats::new();
        assert_eq!(stats.cycles, 0);
        assert_eq!(stats.refs_drained, 0);
        assert_eq!(stats.frames_sent, 0);
        assert_eq!(stats.frames_skipped, 0);
        assert_eq!(stats.frames_discarded, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.control_warnings, 0);
    }

    #[test]
    fn test_record_sent() {
        let mut stats = RelayStats::new();
        stats.record_sent(1200);
        stats.record_sent(800);

        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.bytes_sent, 2000);
    }

    #[test]
    fn test_frame_rate_without_frames() {
        let stats = RelayStats::new();
        assert_eq!(stats.frame_rate(), 0.0);
    }
}
