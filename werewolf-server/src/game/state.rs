//! Game State Definitions
//!
//! The snapshot every device agrees on. The host mutates it through
//! [`GameEngine`](crate::game::engine::GameEngine); everyone else only
//! replaces it wholesale.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::game::events::{EventKind, EventLogItem};
use crate::game::roles::{Alignment, RoleId};
use crate::game::settings::GameSettings;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identifier, opaque to the engine.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A seat at the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Identifier.
    pub id: PlayerId,
    /// Display name, not unique.
    pub name: String,
    /// Avatar reference (data URL or link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_data_url: Option<String>,
    /// Assigned once at game start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,
    /// Flips to false once; never revived.
    pub alive: bool,
}

impl Player {
    /// Create a living player without a role.
    pub fn new(id: PlayerId, name: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar_data_url: avatar,
            role: None,
            alive: true,
        }
    }

    /// Whether this player is an alive werewolf.
    pub fn is_alive_wolf(&self) -> bool {
        self.alive && self.role == Some(RoleId::Werewolf)
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// Current step of the game. Exactly one is active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum Phase {
    /// Gathering players.
    Lobby,
    /// Everyone looks at their role.
    RoleAssignment,
    /// Night actions are collected.
    NightStart {
        /// Round number.
        round: u32,
    },
    /// Night outcome is shown.
    DayStart {
        /// Round number.
        round: u32,
    },
    /// Free talk among players.
    PlayerTalking {
        /// Round number.
        round: u32,
        /// Wall-clock deadline (ms since epoch).
        ends_at: u64,
    },
    /// Timed discussion, optionally with the narrator.
    Discussion {
        /// Round number.
        round: u32,
        /// Wall-clock deadline (ms since epoch).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ends_at: Option<u64>,
    },
    /// Votes are cast one voter at a time.
    Voting {
        /// Round number.
        round: u32,
        /// Alive players in seat order.
        voter_queue: Vec<PlayerId>,
        /// Next voter.
        current_index: usize,
        /// Vote per voter, `None` for abstain or not yet cast.
        votes: BTreeMap<PlayerId, Option<PlayerId>>,
        /// During a revote, only these players can be voted out.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        candidates: Option<Vec<PlayerId>>,
    },
    /// Vote outcome is shown.
    LynchResolve {
        /// Round number.
        round: u32,
    },
    /// Terminal until reset.
    GameOver {
        /// Winning side.
        winners: Alignment,
    },
}

impl Phase {
    /// Wire name of the phase.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Lobby => "Lobby",
            Phase::RoleAssignment => "RoleAssignment",
            Phase::NightStart { .. } => "NightStart",
            Phase::DayStart { .. } => "DayStart",
            Phase::PlayerTalking { .. } => "PlayerTalking",
            Phase::Discussion { .. } => "Discussion",
            Phase::Voting { .. } => "Voting",
            Phase::LynchResolve { .. } => "LynchResolve",
            Phase::GameOver { .. } => "GameOver",
        }
    }

    /// Deadline of timed phases.
    pub fn ends_at(&self) -> Option<u64> {
        match self {
            Phase::PlayerTalking { ends_at, .. } => Some(*ends_at),
            Phase::Discussion { ends_at, .. } => *ends_at,
            _ => None,
        }
    }

    /// Whether the game has not started.
    pub fn is_lobby(&self) -> bool {
        matches!(self, Phase::Lobby)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// NIGHT ACTIONS / ROLE REVEAL
// =============================================================================

/// Targets chosen during the current night. Cleared at each `NightStart`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightActions {
    /// Medic's protected player.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protect_id: Option<PlayerId>,
    /// Werewolves' target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_target_id: Option<PlayerId>,
    /// Seer's target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peek_target_id: Option<PlayerId>,
}

impl NightActions {
    /// The player who dies tonight, if any. Protection cancels the kill.
    pub fn killed(&self) -> Option<&PlayerId> {
        match (&self.kill_target_id, &self.protect_id) {
            (Some(kill), Some(protect)) if kill == protect => None,
            (kill, _) => kill.as_ref(),
        }
    }
}

/// Order in which roles are revealed, and the current position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReveal {
    /// Player ids, fixed at game start.
    pub order: Vec<PlayerId>,
    /// Cursor into `order`.
    pub index: usize,
}

impl RoleReveal {
    /// Player currently being revealed.
    pub fn current(&self) -> Option<&PlayerId> {
        self.order.get(self.index)
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Aggregate root of one game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Game identifier, regenerated on reset.
    pub id: String,
    /// Seed for role assignment and tie breaks.
    pub seed: u32,
    /// Increments on every applied mutation.
    #[serde(default)]
    pub version: u64,
    /// Host settings.
    pub settings: GameSettings,
    /// Players in seat order.
    pub players: Vec<Player>,
    /// Current phase.
    pub phase: Phase,
    /// Round counter, 0 in the lobby.
    pub round: u32,
    /// Pending night actions.
    #[serde(default)]
    pub night_actions: NightActions,
    /// Append-only log.
    #[serde(default)]
    pub event_log: Vec<EventLogItem>,
    /// Role reveal cursor.
    #[serde(default)]
    pub role_reveal: RoleReveal,
}

impl GameState {
    /// Fresh lobby.
    pub fn new(id: impl Into<String>, seed: u32) -> Self {
        Self {
            id: id.into(),
            seed,
            version: 0,
            settings: GameSettings::default(),
            players: Vec::new(),
            phase: Phase::Lobby,
            round: 0,
            night_actions: NightActions::default(),
            event_log: Vec::new(),
            role_reveal: RoleReveal::default(),
        }
    }

    /// Get a player.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Get a player mutably.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Alive players in seat order.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    /// Number of alive players.
    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    /// Number of alive werewolves.
    pub fn alive_wolves(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive_wolf()).count()
    }

    /// Winner given the living population, if the game is decided.
    pub fn winner(&self) -> Option<Alignment> {
        let wolves = self.alive_wolves();
        let town = self.alive_count() - wolves;
        if wolves == 0 {
            Some(Alignment::Town)
        } else if wolves >= town {
            Some(Alignment::Wolf)
        } else {
            None
        }
    }

    /// Events visible to everyone.
    pub fn public_events(&self) -> impl Iterator<Item = &EventLogItem> {
        self.event_log.iter().filter(|e| e.public)
    }

    /// Most recent public event of one of `kinds`.
    pub fn last_public_event(&self, kinds: &[EventKind]) -> Option<&EventLogItem> {
        self.event_log.iter().rev().find(|e| e.public && kinds.contains(&e.kind))
    }
}
