//! Error types
//!
//! Faults that end a relay session or prevent it from starting. Conditions the
//! relay recovers from on its own (an unreadable frame, a corrupt control
//! document) are typed results in their own modules and never reach here.

use std::fmt;
use std::io;

use crate::registry::RegistryError;
use crate::session::SessionKey;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error type
#[derive(Debug)]
pub enum Error {
    /// Filesystem or socket I/O failure
    Io(io::Error),
    /// User or camera id cannot be turned into a session key
    InvalidSessionKey(String),
    /// Another relay already serves this session key
    StartupConflict(SessionKey),
    /// A blocking task panicked or was cancelled
    Fault(String),
    /// Invalid configuration (e.g. unreadable access list)
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidSessionKey(reason) => write!(f, "Invalid session key: {}", reason),
            Error::StartupConflict(key) => {
                write!(f, "Session already being served: {}", key)
            }
            Error::Fault(reason) => write!(f, "Relay fault: {}", reason),
            Error::Config(reason) => write!(f, "Configuration error: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::SessionActive(key) => Error::StartupConflict(key),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Fault(e.to_string())
    }
}
