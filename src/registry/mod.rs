//! In-process session registry
//!
//! Maps each session key to the lease of the relay serving it. A lease is
//! refreshed by the relay once per poll cycle; one that stops being refreshed
//! expires after the configured TTL, so a relay that died without cleaning up
//! cannot block its key forever.
//!
//! ```text
//!              Arc<SessionRegistry>
//!         ┌──────────────────────────────┐
//!         │ leases: Mutex<HashMap<Key,   │
//!         │   LeaseEntry { token,        │
//!         │                heartbeat }>> │
//!         └──────────────┬───────────────┘
//!                        │ try_acquire()
//!                        ▼
//!                 Lease (RAII guard)
//!            heartbeat() each cycle, drop releases
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{Lease, LeaseEntry};
pub use error::RegistryError;
pub use store::SessionRegistry;
