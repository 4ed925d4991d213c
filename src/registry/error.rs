//! Registry error types

use crate::session::SessionKey;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A live lease already exists for this key
    SessionActive(SessionKey),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::SessionActive(key) => write!(f, "Session already active: {}", key),
        }
    }
}

impl std::error::Error for RegistryError {}
