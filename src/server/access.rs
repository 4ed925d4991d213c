//! Viewer access checks
//!
//! The endpoint asks an [`AccessCheck`] whether a user may watch a camera
//! before anything touches the filesystem. A denial produces a plain 403 and
//! no relay.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Decides whether a user may view a camera
///
/// Implementors write `async fn can_access(...)`; it may be slow (a database
/// lookup, a remote call) and is awaited before any response headers go out.
pub trait AccessCheck: Send + Sync + 'static {
    fn can_access(
        &self,
        user_id: &str,
        camera_id: &str,
    ) -> impl Future<Output = bool> + Send;
}

/// Grants every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessCheck for AllowAll {
    async fn can_access(&self, _user_id: &str, _camera_id: &str) -> bool {
        true
    }
}

/// Static ownership table: a user may view the cameras listed under them.
///
/// Loaded from JSON shaped like `{"alice": ["cam1", "cam2"], "bob": []}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AccessList {
    owners: HashMap<String, HashSet<String>>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `camera_id` to the cameras `user_id` owns
    pub fn grant(mut self, user_id: impl Into<String>, camera_id: impl Into<String>) -> Self {
        self.owners
            .entry(user_id.into())
            .or_default()
            .insert(camera_id.into());
        self
    }

    /// Parse an access list document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid access list: {}", e)))
    }

    /// Read and parse an access list file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read access list {}: {}", path.display(), e))
        })?;
        let list = Self::from_json(&json)?;

        tracing::info!(path = %path.display(), users = list.owners.len(), "Access list loaded");
        Ok(list)
    }

    /// True if the user is known at all
    pub fn has_user(&self, user_id: &str) -> bool {
        self.owners.contains_key(user_id)
    }

    /// True if the user exists and owns the camera
    pub fn owns(&self, user_id: &str, camera_id: &str) -> bool {
        self.owners
            .get(user_id)
            .is_some_and(|cameras| cameras.contains(camera_id))
    }
}

impl AccessCheck for AccessList {
    async fn can_access(&self, user_id: &str, camera_id: &str) -> bool {
        self.owns(user_id, camera_id)
    }
}
