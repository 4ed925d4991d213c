//! Session key
//!
//! A session key scopes one relay, one mailbox, one control channel and one
//! exclusivity marker. It is used verbatim as a file name, so both halves are
//! restricted to a path-safe alphabet.

use std::fmt;

use crate::error::{Error, Result};

/// Longest accepted user or camera id, in bytes
pub const MAX_ID_LEN: usize = 128;

/// Identifier of a (user, camera) relay session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    user_id: String,
    camera_id: String,
}

impl SessionKey {
    /// Create a session key from a user id and a camera id
    pub fn new(user_id: impl Into<String>, camera_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let camera_id = camera_id.into();

        validate("user id", &user_id)?;
        validate("camera id", &camera_id)?;

        Ok(Self { user_id, camera_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// File name of the mailbox backing object for this key
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.user_id, self.camera_id)
    }
}

fn validate(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidSessionKey(format!("{} is empty", what)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(Error::InvalidSessionKey(format!(
            "{} longer than {} bytes",
            what, MAX_ID_LEN
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(Error::InvalidSessionKey(format!(
            "{} contains {:?}",
            what, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_with_dot() {
        let key = SessionKey::new("1001", "front-door").unwrap();
        assert_eq!(key.to_string(), "1001.front-door");
        assert_eq!(key.file_name(), "1001.front-door");
        assert_eq!(key.user_id(), "1001");
        assert_eq!(key.camera_id(), "front-door");
    }

    #[test]
    fn test_rejects_path_components() {
        assert!(SessionKey::new("..", "cam").is_err());
        assert!(SessionKey::new("alice", "../etc").is_err());
        assert!(SessionKey::new("a/b", "cam").is_err());
        assert!(SessionKey::new("alice", "cam.ctrl").is_err());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(SessionKey::new("", "cam").is_err());
        assert!(SessionKey::new("alice", "").is_err());
        assert!(SessionKey::new("a".repeat(MAX_ID_LEN + 1), "cam").is_err());
        assert!(SessionKey::new("a".repeat(MAX_ID_LEN), "cam").is_ok());
    }
}
