//! Control channel
//!
//! A small JSON document next to the mailbox that an external controller may
//! rewrite at any time, e.g. `{"status": "stopped"}`. The relay polls it once
//! per cycle. A missing file means "keep running"; a document that cannot be
//! used is reported as [`ControlRead::Corrupt`] and treated as no directive
//! for that cycle.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::lock::FileLock;

/// Status value that keeps a relay running
pub const STATUS_RUNNING: &str = "running";

/// Status value written by controllers to stop a relay
pub const STATUS_STOPPED: &str = "stopped";

/// Control document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlDocument {
    /// Anything other than "running" is a stop directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Fields this relay does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ControlDocument {
    pub fn running() -> Self {
        Self::with_status(STATUS_RUNNING)
    }

    pub fn stopped() -> Self {
        Self::with_status(STATUS_STOPPED)
    }

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// True when the document tells the relay to stop
    pub fn is_stop(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status != STATUS_RUNNING)
    }
}

/// Outcome of one control channel poll
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRead {
    /// No control file; keep running
    Absent,
    /// A usable document
    Directive(ControlDocument),
    /// File present but unusable; keep running this cycle
    Corrupt(String),
}

impl ControlRead {
    /// True when this poll commands a stop
    pub fn is_stop(&self) -> bool {
        matches!(self, ControlRead::Directive(doc) if doc.is_stop())
    }
}

/// Handle on one session's control file
#[derive(Debug, Clone)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current directive under a shared lock.
    ///
    /// Only opening or reading the file can fail; bad content is a
    /// [`ControlRead::Corrupt`] value.
    pub fn read_directive(&self) -> io::Result<ControlRead> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ControlRead::Absent),
            Err(e) => return Err(e),
        };

        let mut content = String::new();
        {
            let guard = FileLock::shared(&file)?;
            let mut reader: &File = &guard;
            if let Err(e) = reader.read_to_string(&mut content) {
                if e.kind() == io::ErrorKind::InvalidData {
                    return Ok(ControlRead::Corrupt("control file is not UTF-8".into()));
                }
                return Err(e);
            }
        }

        Ok(parse_document(&content))
    }

    /// Controller side: replace the document under an exclusive lock
    pub fn write(&self, doc: &ControlDocument) -> io::Result<()> {
        let body = serde_json::to_vec(doc)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let guard = FileLock::exclusive(&file)?;
        guard.set_len(0)?;
        let mut writer: &File = &guard;
        writer.write_all(&body)?;
        writer.flush()
    }
}

fn parse_document(content: &str) -> ControlRead {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return ControlRead::Corrupt(format!("invalid JSON: {}", e)),
    };

    match &value {
        serde_json::Value::Object(map) if map.is_empty() => {
            return ControlRead::Corrupt("empty document".into());
        }
        serde_json::Value::Object(_) => {}
        other => {
            return ControlRead::Corrupt(format!("expected an object, got {}", kind(other)));
        }
    }

    match serde_json::from_value::<ControlDocument>(value) {
        Ok(doc) => ControlRead::Directive(doc),
        Err(e) => ControlRead::Corrupt(format!("invalid document: {}", e)),
    }
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(dir: &Path) -> ControlChannel {
        ControlChannel::new(dir.join("alice.cam1.ctrl"))
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let read = channel(dir.path()).read_directive().unwrap();

        assert_eq!(read, ControlRead::Absent);
        assert!(!read.is_stop());
    }

    #[test]
    fn test_running_and_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let ch = channel(dir.path());

        ch.write(&ControlDocument::running()).unwrap();
        assert!(!ch.read_directive().unwrap().is_stop());

        ch.write(&ControlDocument::stopped()).unwrap();
        assert!(ch.read_directive().unwrap().is_stop());
    }

    #[test]
    fn test_any_other_status_stops() {
        let dir = tempfile::tempdir().unwrap();
        let ch = channel(dir.path());
        std::fs::write(ch.path(), r#"{"status":"paused"}"#).unwrap();

        assert!(ch.read_directive().unwrap().is_stop());
    }

    #[test]
    fn test_document_without_status_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let ch = channel(dir.path());
        std::fs::write(ch.path(), r#"{"fps": 5}"#).unwrap();

        match ch.read_directive().unwrap() {
            ControlRead::Directive(doc) => {
                assert!(!doc.is_stop());
                assert_eq!(doc.extra.get("fps"), Some(&serde_json::json!(5)));
            }
            other => panic!("unexpected read: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_documents_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let ch = channel(dir.path());

        for content in ["", "{", "null", "{}", "[]", "\"\"", "42", r#"{"status": 1}"#] {
            std::fs::write(ch.path(), content).unwrap();
            let read = ch.read_directive().unwrap();

            assert!(
                matches!(read, ControlRead::Corrupt(_)),
                "{:?} should be corrupt, got {:?}",
                content,
                read
            );
            assert!(!read.is_stop());
        }
    }

    #[test]
    fn test_write_replaces_longer_document() {
        let dir = tempfile::tempdir().unwrap();
        let ch = channel(dir.path());

        let mut doc = ControlDocument::running();
        doc.extra
            .insert("note".into(), serde_json::json!("a fairly long note"));
        ch.write(&doc).unwrap();
        ch.write(&ControlDocument::stopped()).unwrap();

        assert_eq!(
            std::fs::read_to_string(ch.path()).unwrap(),
            r#"{"status":"stopped"}"#
        );
    }
}
