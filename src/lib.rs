//! MJPEG relay
//!
//! Streams JPEG frames produced by a separate capture process to HTTP viewers
//! as a `multipart/x-mixed-replace` response. Producer and relay share only a
//! directory: the producer appends frame paths to a per-session mailbox file
//! and may drop a JSON control document next to it; the relay polls both once
//! per interval and writes at most one frame per poll.
//!
//! # Example
//!
//! ```no_run
//! use mjpeg_relay::{AllowAll, RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mjpeg_relay::Result<()> {
//!     let config = ServerConfig::default().mailbox_dir("/var/spool/mjpeg");
//!     let server = RelayServer::new(config, AllowAll);
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod mailbox;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use mailbox::{ControlDocument, FrameRef, Mailbox};
pub use registry::{RegistryConfig, SessionRegistry};
pub use relay::{FrameRelay, RelayConfig, RelayOutcome};
pub use server::{AccessCheck, AccessList, AllowAll, RelayServer, ServerConfig};
pub use session::{SessionKey, StopReason};
pub use stats::RelayStats;
