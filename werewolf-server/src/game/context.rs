//! Public game context handed to the narrator.
//!
//! Built from a snapshot with every hidden detail removed: no roles, no
//! private log entries.

use serde::{Serialize, Deserialize};

use crate::game::events::{EventKind, EventLogItem};
use crate::game::state::{GameState, PlayerId};

/// How many recent public events the narrator sees.
pub const RECENT_EVENTS: usize = 5;

/// Player reference without hidden information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
}

/// What the narrator may know about the game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NarratorContext {
    /// Phase name, e.g. `NightStart`.
    pub phase: String,
    /// Round counter.
    pub round: u32,
    /// Alive players in seat order.
    pub alive_players: Vec<PlayerRef>,
    /// Eliminated players in seat order.
    pub dead_players: Vec<PlayerRef>,
    /// Last public events, oldest first.
    pub recent_events: Vec<EventLogItem>,
}

impl NarratorContext {
    /// Strip a snapshot down to public information.
    pub fn from_state(state: &GameState) -> Self {
        let refs = |alive: bool| {
            state.players.iter()
                .filter(|p| p.alive == alive)
                .map(|p| PlayerRef { id: p.id.clone(), name: p.name.clone() })
                .collect::<Vec<_>>()
        };
        let public: Vec<&EventLogItem> = state.public_events().collect();
        let skip = public.len().saturating_sub(RECENT_EVENTS);

        Self {
            phase: state.phase.name().to_string(),
            round: state.round,
            alive_players: refs(true),
            dead_players: refs(false),
            recent_events: public.into_iter().skip(skip).cloned().collect(),
        }
    }

    /// Display name for an id, if the player is known.
    pub fn name_of(&self, id: &PlayerId) -> Option<&str> {
        self.alive_players.iter()
            .chain(&self.dead_players)
            .find(|p| &p.id == id)
            .map(|p| p.name.as_str())
    }

    /// Most recent death (night kill or lynch).
    pub fn latest_death(&self) -> Option<&EventLogItem> {
        self.recent_events.iter()
            .rev()
            .find(|e| matches!(e.kind, EventKind::NightKill | EventKind::Lynch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::GameEngine;

    #[test]
    fn test_context_hides_private_details() {
        let mut engine = GameEngine::with_seed("g", 5);
        for name in ["Ann", "Ben", "Cid", "Dee", "Eli"] {
            engine.add_player_with_id(PlayerId::from(name), name, None);
        }
        engine.start_game();
        engine.proceed_from_role_reveal();
        engine.choose_peek(Some(PlayerId::from("Ann")));
        engine.choose_kill(Some(PlayerId::from("Ben")));
        engine.resolve_night();

        let ctx = NarratorContext::from_state(engine.state());
        assert_eq!(ctx.phase, "DayStart");
        assert_eq!(ctx.round, 1);
        assert_eq!(ctx.dead_players.len() + ctx.alive_players.len(), 5);
        assert!(ctx.recent_events.iter().all(|e| e.public));

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("werewolf"));
        assert!(!json.contains("role"));
    }

    #[test]
    fn test_recent_events_window() {
        let mut state = GameState::new("g", 1);
        for i in 0..8 {
            state.event_log.push(EventLogItem::no_kill(i, i as u32 + 1));
        }
        let ctx = NarratorContext::from_state(&state);
        assert_eq!(ctx.recent_events.len(), RECENT_EVENTS);
        assert_eq!(ctx.recent_events[0].round, 4);
    }
}
