//! File-backed frame mailbox
//!
//! The producer and the relay run as separate processes and share nothing but
//! a directory. Each session key owns two files in it:
//!
//! ```text
//!   {mailbox_dir}/{user}.{camera}        newline-delimited frame references
//!   {mailbox_dir}/{user}.{camera}.ctrl   JSON control document
//! ```
//!
//! The producer appends one line per finished frame. The relay drains the
//! whole file under an exclusive lock and truncates it in the same critical
//! section, so a reference is delivered at most once and none is lost between
//! the read and the reset.
//!
//! The mailbox file doubles as the exclusivity marker: it exists exactly while
//! a relay serves the key.

pub mod control;
pub mod lock;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::session::SessionKey;

pub use control::{ControlChannel, ControlDocument, ControlRead};
pub use lock::{FileLock, LockMode};

/// Suffix appended to the mailbox path to name the control channel
pub const CONTROL_SUFFIX: &str = ".ctrl";

/// A location from which one JPEG frame can be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef(String);

impl FrameRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against `root` unless the reference is already absolute
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.0);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle on one session's mailbox file
#[derive(Debug, Clone)]
pub struct Mailbox {
    path: PathBuf,
}

impl Mailbox {
    /// Mailbox for `key` inside `dir`
    pub fn new(dir: impl AsRef<Path>, key: &SessionKey) -> Self {
        Self {
            path: dir.as_ref().join(key.file_name()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Control channel that belongs to this mailbox
    pub fn control_channel(&self) -> ControlChannel {
        let mut path = self.path.clone().into_os_string();
        path.push(CONTROL_SUFFIX);
        ControlChannel::new(PathBuf::from(path))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the backing file empty. Fails with `AlreadyExists` without
    /// touching the file if it is already there.
    pub fn create(&self) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Delete the backing file; absence is not an error
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Refresh the backing file's modification time
    pub fn touch(&self) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_modified(SystemTime::now())
    }

    /// Time since the backing file was last modified
    pub fn age(&self) -> io::Result<Duration> {
        let modified = fs::metadata(&self.path)?.modified()?;
        Ok(modified.elapsed().unwrap_or(Duration::ZERO))
    }

    /// Producer side: add one reference to the tail.
    ///
    /// Returns `Ok(false)` when no relay is serving the key (the backing file
    /// is absent); the mailbox is never created from this side.
    pub fn append(&self, frame: &FrameRef) -> io::Result<bool> {
        if frame.as_str().contains(['\n', '\r']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame reference must be a single line",
            ));
        }

        let file = match OpenOptions::new().append(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let guard = FileLock::exclusive(&file)?;
        let mut line = String::with_capacity(frame.as_str().len() + 1);
        line.push_str(frame.as_str());
        line.push('\n');
        (&*guard).write_all(line.as_bytes())?;

        Ok(true)
    }

    /// Consumer side: take every reference appended since the last drain.
    ///
    /// An absent or empty file yields an empty batch; that is the idle case.
    pub fn drain_all(&self) -> io::Result<Vec<FrameRef>> {
        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let guard = FileLock::exclusive(&file)?;
        let content = read_all(&guard)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        guard.set_len(0)?;
        drop(guard);

        Ok(parse_refs(&String::from_utf8_lossy(&content)))
    }
}

fn read_all(file: &File) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut reader = file;
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

fn parse_refs(content: &str) -> Vec<FrameRef> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(FrameRef::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn mailbox(dir: &Path) -> Mailbox {
        Mailbox::new(dir, &SessionKey::new("alice", "cam1").unwrap())
    }

    #[test]
    fn test_paths_derive_from_key() {
        let mb = Mailbox::new("/var/spool/relay", &SessionKey::new("7", "door").unwrap());

        assert_eq!(mb.path(), Path::new("/var/spool/relay/7.door"));
        assert_eq!(
            mb.control_channel().path(),
            Path::new("/var/spool/relay/7.door.ctrl")
        );
    }

    #[test]
    fn test_drain_preserves_append_order_once() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());
        mb.create().unwrap();

        assert!(mb.append(&FrameRef::new("a.jpg")).unwrap());
        assert!(mb.append(&FrameRef::new("b.jpg")).unwrap());

        let drained = mb.drain_all().unwrap();
        assert_eq!(drained, vec![FrameRef::new("a.jpg"), FrameRef::new("b.jpg")]);

        // Nothing appended since: nothing delivered twice
        assert!(mb.drain_all().unwrap().is_empty());

        mb.append(&FrameRef::new("c.jpg")).unwrap();
        assert_eq!(mb.drain_all().unwrap(), vec![FrameRef::new("c.jpg")]);
    }

    #[test]
    fn test_drain_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());

        let drained = assert_ok!(mb.drain_all());
        assert!(drained.is_empty());
        assert!(!mb.exists());
    }

    #[test]
    fn test_drain_skips_blank_lines_and_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());
        fs::write(mb.path(), "f1.jpg\r\n\n  \nf2.jpg\n\n").unwrap();

        let drained = mb.drain_all().unwrap();
        assert_eq!(drained, vec![FrameRef::new("f1.jpg"), FrameRef::new("f2.jpg")]);
        assert_eq!(fs::metadata(mb.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_append_without_relay_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());

        assert!(!mb.append(&FrameRef::new("a.jpg")).unwrap());
        assert!(!mb.exists());
    }

    #[test]
    fn test_append_rejects_multiline_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());
        mb.create().unwrap();

        assert_err!(mb.append(&FrameRef::new("a.jpg\nb.jpg")));
        assert!(mb.drain_all().unwrap().is_empty());
    }

    #[test]
    fn test_create_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());
        fs::write(mb.path(), "held.jpg\n").unwrap();

        let err = mb.create().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(mb.path()).unwrap(), "held.jpg\n");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mb = mailbox(dir.path());
        mb.create().unwrap();

        mb.remove().unwrap();
        mb.remove().unwrap();
        assert!(!mb.exists());
    }

    #[test]
    fn test_frame_ref_resolution() {
        let root = Path::new("/srv/frames");

        assert_eq!(
            FrameRef::new("spool/1.jpg").resolve(root),
            PathBuf::from("/srv/frames/spool/1.jpg")
        );
        assert_eq!(
            FrameRef::new("/tmp/2.jpg").resolve(root),
            PathBuf::from("/tmp/2.jpg")
        );
    }
}
