//! Relay session state machine
//!
//! Tracks a relay from lock acquisition to teardown:
//! `Initializing -> Streaming -> Draining -> Stopped`. Transitions only move
//! forward; a stopped session is never restarted.

use std::time::{Duration, Instant};

use super::key::SessionKey;

/// Relay lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Lock taken, mailbox being created
    Initializing,
    /// Poll loop running
    Streaming,
    /// Stop observed, finishing the cycle and discarding buffered frames
    Draining,
    /// Lock released, response ended
    Stopped,
}

/// Why a relay left the streaming phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Control document carried a status other than "running"
    Directive,
    /// Viewer disconnected (write to the response failed)
    ClientGone,
    /// Hosting server is shutting down
    Shutdown,
    /// Mailbox removed from outside while streaming
    Teardown,
    /// Unrecoverable I/O or task failure
    Fault(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Directive => write!(f, "stop directive"),
            StopReason::ClientGone => write!(f, "client gone"),
            StopReason::Shutdown => write!(f, "server shutdown"),
            StopReason::Teardown => write!(f, "mailbox torn down"),
            StopReason::Fault(reason) => write!(f, "fault: {}", reason),
        }
    }
}

/// Complete relay session state
#[derive(Debug)]
pub struct SessionState {
    /// Session key
    pub key: SessionKey,

    /// Current phase
    pub phase: SessionPhase,

    /// When initialization started
    pub started_at: Instant,

    /// When streaming began
    pub streaming_since: Option<Instant>,

    /// Reason for leaving the streaming phase
    pub stop_reason: Option<StopReason>,
}

impl SessionState {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            phase: SessionPhase::Initializing,
            started_at: Instant::now(),
            streaming_since: None,
            stop_reason: None,
        }
    }

    /// Enter the poll loop
    pub fn start_streaming(&mut self) {
        if self.phase == SessionPhase::Initializing {
            self.phase = SessionPhase::Streaming;
            self.streaming_since = Some(Instant::now());
        }
    }

    /// Leave the poll loop. The first reason recorded wins.
    pub fn begin_drain(&mut self, reason: StopReason) {
        if matches!(
            self.phase,
            SessionPhase::Initializing | SessionPhase::Streaming
        ) {
            self.phase = SessionPhase::Draining;
            self.stop_reason = Some(reason);
        }
    }

    /// Mark the session stopped
    pub fn stop(&mut self) {
        self.phase = SessionPhase::Stopped;
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Time spent streaming so far
    pub fn streaming_duration(&self) -> Duration {
        self.streaming_since
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(SessionKey::new("alice", "cam1").unwrap())
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = state();
        assert_eq!(state.phase, SessionPhase::Initializing);
        assert_eq!(state.streaming_duration(), Duration::ZERO);

        state.start_streaming();
        assert!(state.is_streaming());
        assert!(state.streaming_since.is_some());

        state.begin_drain(StopReason::Directive);
        assert_eq!(state.phase, SessionPhase::Draining);
        assert_eq!(state.stop_reason, Some(StopReason::Directive));

        state.stop();
        assert_eq!(state.phase, SessionPhase::Stopped);
    }

    #[test]
    fn test_first_stop_reason_wins() {
        let mut state = state();
        state.start_streaming();

        state.begin_drain(StopReason::ClientGone);
        state.begin_drain(StopReason::Shutdown);

        assert_eq!(state.stop_reason, Some(StopReason::ClientGone));
    }

    #[test]
    fn test_stopped_session_does_not_restart() {
        let mut state = state();
        state.start_streaming();
        state.begin_drain(StopReason::Shutdown);
        state.stop();

        state.start_streaming();
        assert_eq!(state.phase, SessionPhase::Stopped);
    }
}
