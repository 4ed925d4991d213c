//! Reading frame bytes
//!
//! A reference that cannot be turned into bytes is skipped, never retried and
//! never an error: the producer may already have rotated the file away.

use std::path::Path;

use bytes::Bytes;

use crate::mailbox::FrameRef;

/// Result of reading one frame reference
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead {
    /// Bytes ready to be sent
    Ready(Bytes),
    /// Reference dropped, with the reason
    Skipped(String),
}

/// Read the bytes behind `frame`, resolving relative references against `root`
pub async fn read_frame(frame: &FrameRef, root: &Path) -> FrameRead {
    let path = frame.resolve(root);

    match tokio::fs::read(&path).await {
        Ok(data) if data.is_empty() => FrameRead::Skipped("empty file".into()),
        Ok(data) => FrameRead::Ready(Bytes::from(data)),
        Err(e) => FrameRead::Skipped(e.to_string()),
    }
}
