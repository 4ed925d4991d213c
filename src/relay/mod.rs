//! MJPEG frame relay
//!
//! Everything between "a viewer asked for a stream" and "the response body
//! ended": the exclusivity guard, the poll ticker, frame reads, multipart
//! framing and the relay loop that ties them together.
//!
//! ```text
//! Initializing ──lock + empty mailbox──► Streaming ──stop──► Draining ──► Stopped
//!      │                                    ▲   │                            │
//!      └─ StartupConflict (no bytes sent)   └───┘ one part per cycle         └─ lock released
//! ```

pub mod config;
pub mod frame;
pub mod framing;
pub mod lock;
pub mod streamer;
pub mod ticker;

pub use config::RelayConfig;
pub use frame::{read_frame, FrameRead};
pub use framing::{encode_part, response_headers, BOUNDARY, CONTENT_TYPE};
pub use lock::{ExclusivityLock, LockStatus};
pub use streamer::{FrameRelay, RelayOutcome};
pub use ticker::Ticker;
