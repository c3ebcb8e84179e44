//! Game Logic Module
//!
//! The host-side state machine. Deterministic given the seed and the
//! `now_ms` values passed in.
//!
//! ## Module Structure
//!
//! - `roles`: Role definitions, counts and seeded assignment
//! - `settings`: Host settings carried in the snapshot
//! - `state`: Players, phases, night actions, the game snapshot
//! - `events`: Append-only event log
//! - `vote`: Ballot tallying
//! - `engine`: Phase transitions
//! - `context`: Public view for the narrator

pub mod roles;
pub mod settings;
pub mod state;
pub mod events;
pub mod vote;
pub mod engine;
pub mod context;

// Re-export key types
pub use roles::{RoleId, Alignment, RoleCounts, assign_roles};
pub use settings::{GameSettings, GameMode, TieRule, Timers};
pub use state::{GameState, Player, PlayerId, Phase, NightActions, RoleReveal};
pub use events::{EventKind, EventLogItem};
pub use engine::GameEngine;
pub use context::NarratorContext;
