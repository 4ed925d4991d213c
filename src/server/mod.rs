//! HTTP server
//!
//! Serves MJPEG streams to viewers. Each accepted stream request runs one
//! [`FrameRelay`](crate::relay::FrameRelay) whose output is the response body.

pub mod access;
pub mod config;
pub mod listener;
pub mod router;

pub use access::{AccessCheck, AccessList, AllowAll};
pub use config::ServerConfig;
pub use listener::RelayServer;
pub use router::FORBIDDEN_BODY;
