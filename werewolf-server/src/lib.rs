//! # Werewolf Server
//!
//! Host-authoritative engine and room registry for a social-deduction
//! party game played on phones in one room.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WEREWOLF SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Mulberry32 PRNG and shuffle               │
//! │  └── hash.rs     - Snapshot digests                          │
//! │                                                              │
//! │  game/           - Game logic (runs on the host device)      │
//! │  ├── roles.rs    - Role counts and seeded assignment         │
//! │  ├── settings.rs - Host settings                             │
//! │  ├── state.rs    - Players, phases, snapshot                 │
//! │  ├── events.rs   - Event log                                 │
//! │  ├── vote.rs     - Ballot tally                              │
//! │  ├── engine.rs   - Phase state machine                       │
//! │  └── context.rs  - Public view for the narrator              │
//! │                                                              │
//! │  network/        - Room registry and transports              │
//! │  ├── registry.rs - Live rooms, barriers, sweep               │
//! │  ├── protocol.rs - Action envelope and replies               │
//! │  ├── http.rs     - axum routes                               │
//! │  └── server.rs   - Listeners and shutdown                    │
//! │                                                              │
//! │  narrator/       - Chat providers, mock, judge, speech       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Role assignment and tie-breaks depend only on the game seed:
//! - Mulberry32 with a float-scaled index pick
//! - No HashMap in game state (BTreeMap for sorted iteration)
//! - Clock values enter only as `now_ms` arguments
//!
//! Any device holding the snapshot can recompute the same roles.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod narrator;
pub mod config;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::engine::GameEngine;
pub use game::state::{GameState, Phase, Player, PlayerId};
pub use network::registry::RoomRegistry;
pub use network::server::GameServer;
pub use config::ServerConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
