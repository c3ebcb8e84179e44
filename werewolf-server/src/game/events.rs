//! Game Events
//!
//! Append-only log of what happened, shared with the narrator and the UI.
//! Private entries (`peek`, `protected`) stay with the acting role.

use serde::{Serialize, Deserialize};

use crate::game::state::PlayerId;

/// Kind of log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A player was killed during the night.
    NightKill,
    /// The medic protected someone.
    Protected,
    /// The seer peeked at someone.
    Peek,
    /// A player was voted out.
    Lynch,
    /// The night passed without a death.
    NoKill,
    /// A new day began.
    StartDay,
}

impl EventKind {
    /// Whether entries of this kind are visible to everyone.
    pub const fn is_public(self) -> bool {
        !matches!(self, EventKind::Protected | EventKind::Peek)
    }
}

/// Event payload. Field names follow the wire format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Player killed or lynched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    /// Player the seer looked at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peek_target_id: Option<PlayerId>,
    /// Player the medic protected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protect_id: Option<PlayerId>,
}

/// One entry in the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogItem {
    /// Sequential id, unique within a game.
    pub id: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Round the event belongs to.
    pub round: u32,
    /// Payload.
    pub data: EventData,
    /// Visible to all players.
    pub public: bool,
}

impl EventLogItem {
    /// Create an entry; visibility follows the kind.
    pub fn new(seq: usize, kind: EventKind, round: u32, data: EventData) -> Self {
        Self {
            id: format!("evt-{}", seq),
            kind,
            round,
            data,
            public: kind.is_public(),
        }
    }

    /// Player killed at night.
    pub fn night_kill(seq: usize, round: u32, player_id: PlayerId) -> Self {
        Self::new(seq, EventKind::NightKill, round, EventData {
            player_id: Some(player_id),
            ..Default::default()
        })
    }

    /// Night without a death.
    pub fn no_kill(seq: usize, round: u32) -> Self {
        Self::new(seq, EventKind::NoKill, round, EventData::default())
    }

    /// Medic protection (private).
    pub fn protected(seq: usize, round: u32, protect_id: PlayerId) -> Self {
        Self::new(seq, EventKind::Protected, round, EventData {
            protect_id: Some(protect_id),
            ..Default::default()
        })
    }

    /// Seer peek (private).
    pub fn peek(seq: usize, round: u32, peek_target_id: PlayerId) -> Self {
        Self::new(seq, EventKind::Peek, round, EventData {
            peek_target_id: Some(peek_target_id),
            ..Default::default()
        })
    }

    /// Player voted out.
    pub fn lynch(seq: usize, round: u32, player_id: PlayerId) -> Self {
        Self::new(seq, EventKind::Lynch, round, EventData {
            player_id: Some(player_id),
            ..Default::default()
        })
    }
}
