//! # Werewolf Client
//!
//! The device side of room synchronization.
//!
//! ```text
//! ┌────────────┐  call / narrate   ┌──────────────┐
//! │ RoomClient │ ────────────────▶ │ RoomTransport│ ── HTTP / in-process
//! └─────┬──────┘                   └──────────────┘
//!       │ get_state
//! ┌─────▼──────┐  wholesale replace  ┌────────┐
//! │  SyncLoop  │ ──────────────────▶ │ Mirror │
//! └─────┬──────┘                     └────────┘
//!       │ barriers, timers (host only)
//! ┌─────▼──────┐
//! │ HostDriver │ ── engine step ─▶ update_game_state
//! └────────────┘
//! ```
//!
//! Every device polls; only the host runs the engine and pushes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod transport;
pub mod client;
pub mod mirror;
pub mod host;
pub mod sync;
pub mod subscribe;

pub use config::ClientConfig;
pub use transport::{HttpTransport, LocalTransport, RoomTransport, TransportError};
pub use client::RoomClient;
pub use mirror::{Mirror, MirrorUpdate};
pub use host::{HostDriver, HostStep};
pub use sync::{SyncLoop, SyncOutcome};
pub use subscribe::RoomSubscription;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
