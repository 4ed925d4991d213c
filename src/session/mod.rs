//! Relay session identity and lifecycle

pub mod key;
pub mod state;

pub use key::SessionKey;
pub use state::{SessionPhase, SessionState, StopReason};
