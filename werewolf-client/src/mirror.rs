//! Read-only Mirror
//!
//! A device's copy of the host's game. It is only ever replaced whole by a
//! received snapshot, never edited, and never moves back to an older
//! version of the same game.

use tracing::{debug, info};

use werewolf::game::engine::GameEngine;
use werewolf::game::state::GameState;

/// Result of offering a snapshot to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorUpdate {
    /// The snapshot replaced the mirror.
    Applied,
    /// Same version as held, or no snapshot offered.
    Unchanged,
    /// Older than what is held; ignored.
    Stale,
}

/// Last applied snapshot.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    state: Option<GameState>,
    state_hash: Option<String>,
}

impl Mirror {
    /// Empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a snapshot. A different game id (after a reset) always wins;
    /// the same game must carry a higher version.
    pub fn apply(&mut self, incoming: Option<GameState>, state_hash: Option<String>) -> MirrorUpdate {
        let Some(incoming) = incoming else {
            return MirrorUpdate::Unchanged;
        };

        if let Some(current) = &self.state {
            if current.id == incoming.id {
                if incoming.version == current.version {
                    return MirrorUpdate::Unchanged;
                }
                if incoming.version < current.version {
                    debug!(
                        "Ignoring stale snapshot v{} (holding v{})",
                        incoming.version, current.version
                    );
                    return MirrorUpdate::Stale;
                }
            } else {
                info!("New game {} replaces {}", incoming.id, current.id);
            }
        }

        self.state = Some(incoming);
        self.state_hash = state_hash;
        MirrorUpdate::Applied
    }

    /// Current snapshot.
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Version of the current snapshot.
    pub fn version(&self) -> Option<u64> {
        self.state.as_ref().map(|s| s.version)
    }

    /// Digest reported with the current snapshot.
    pub fn state_hash(&self) -> Option<&str> {
        self.state_hash.as_deref()
    }

    /// Whether the mirrored game is still in the lobby (or absent).
    pub fn in_lobby(&self) -> bool {
        self.state.as_ref().map_or(true, |s| s.phase.is_lobby())
    }

    /// Engine hydrated from the snapshot, for read-only queries.
    pub fn engine(&self) -> Option<GameEngine> {
        self.state.clone().map(GameEngine::from_snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, version: u64) -> GameState {
        let mut state = GameState::new(id, 7);
        state.version = version;
        state
    }

    #[test]
    fn test_first_snapshot_applies() {
        let mut mirror = Mirror::new();
        assert!(mirror.in_lobby());
        assert_eq!(mirror.apply(Some(snapshot("g1", 3)), Some("abcd".into())), MirrorUpdate::Applied);
        assert_eq!(mirror.version(), Some(3));
        assert_eq!(mirror.state_hash(), Some("abcd"));
    }

    #[test]
    fn test_never_regresses() {
        let mut mirror = Mirror::new();
        mirror.apply(Some(snapshot("g1", 5)), None);

        assert_eq!(mirror.apply(Some(snapshot("g1", 4)), None), MirrorUpdate::Stale);
        assert_eq!(mirror.apply(Some(snapshot("g1", 5)), None), MirrorUpdate::Unchanged);
        assert_eq!(mirror.version(), Some(5));

        assert_eq!(mirror.apply(Some(snapshot("g1", 6)), None), MirrorUpdate::Applied);
        assert_eq!(mirror.version(), Some(6));
    }

    #[test]
    fn test_new_game_replaces() {
        let mut mirror = Mirror::new();
        mirror.apply(Some(snapshot("g1", 9)), None);
        assert_eq!(mirror.apply(Some(snapshot("g2", 1)), None), MirrorUpdate::Applied);
        assert_eq!(mirror.state().map(|s| s.id.as_str()), Some("g2"));
    }

    #[test]
    fn test_missing_snapshot_keeps_previous() {
        let mut mirror = Mirror::new();
        mirror.apply(Some(snapshot("g1", 2)), None);
        assert_eq!(mirror.apply(None, None), MirrorUpdate::Unchanged);
        assert_eq!(mirror.version(), Some(2));
    }

    #[test]
    fn test_engine_view() {
        let mut mirror = Mirror::new();
        assert!(mirror.engine().is_none());
        mirror.apply(Some(snapshot("g1", 1)), None);
        assert_eq!(mirror.engine().map(|e| e.state().version), Some(1));
    }
}
