//! Game Settings
//!
//! Host-owned knobs, propagated to every device inside the snapshot.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::game::roles::RoleId;

/// Smallest table any mode accepts.
pub const MIN_PLAYERS_FLOOR: usize = 3;

/// Default minimum table size.
pub const DEFAULT_MIN_PLAYERS: usize = 5;

/// What happens when the top vote count is shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TieRule {
    /// Vote again among the tied candidates only.
    #[serde(rename = "revote")]
    Revote,
    /// Pick one tied candidate with the seeded RNG.
    #[serde(rename = "random")]
    Random,
    /// Nobody is eliminated.
    #[default]
    #[serde(rename = "no-lynch")]
    NoLynch,
}

/// Flavor theme for narration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Village and werewolves.
    #[default]
    Werewolf,
    /// Town and mafia.
    Mafia,
    /// Host-provided prompt.
    Custom,
}

/// Day flow variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Timed discussion, then every player casts their own vote.
    #[default]
    Classic,
    /// Free player talk, then discussion, then the narrator judges.
    Judge,
}

/// Phase timers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timers {
    /// Length of `PlayerTalking`.
    pub player_talking_sec: u64,
    /// Length of `Discussion`.
    pub discussion_sec: u64,
    /// Reserved for a defense speech display.
    pub defense_sec: u64,
    /// Resolve the night as soon as the barrier clears.
    pub night_auto_advance: bool,
    /// How long outcome screens (DayStart, LynchResolve) stay up.
    pub display_delay_ms: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            player_talking_sec: 60,
            discussion_sec: 120,
            defense_sec: 30,
            night_auto_advance: false,
            display_delay_ms: 5_000,
        }
    }
}

/// Settings for one game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    /// Narration theme.
    pub theme: Theme,
    /// Prompt used with `Theme::Custom`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_theme_prompt: Option<String>,
    /// Personality handed to the narrator.
    pub host_personality: String,
    /// Preferred narrator provider name, or `auto`.
    pub ai_provider: String,
    /// Explicit role counts. Missing roles use the automatic formula.
    pub roles_enabled: BTreeMap<RoleId, usize>,
    /// Phase timers.
    pub timers: Timers,
    /// Whether a medic may protect themself.
    pub allow_self_protect: bool,
    /// Vote tie handling.
    pub tie_rule: TieRule,
    /// Smallest table that may start.
    pub min_players: usize,
    /// Day flow variant.
    pub mode: GameMode,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Werewolf,
            custom_theme_prompt: None,
            host_personality: "classic".to_string(),
            ai_provider: "auto".to_string(),
            roles_enabled: BTreeMap::new(),
            timers: Timers::default(),
            allow_self_protect: false,
            tie_rule: TieRule::NoLynch,
            min_players: DEFAULT_MIN_PLAYERS,
            mode: GameMode::Classic,
        }
    }
}

impl GameSettings {
    /// Minimum players, never below the floor.
    pub fn effective_min_players(&self) -> usize {
        self.min_players.max(MIN_PLAYERS_FLOOR)
    }

    /// Set an explicit count for a special role. Villagers are never counted.
    pub fn set_role_count(&mut self, role: RoleId, count: usize) {
        if role != RoleId::Villager {
            self.roles_enabled.insert(role, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GameSettings::default();
        assert_eq!(settings.tie_rule, TieRule::NoLynch);
        assert_eq!(settings.timers.discussion_sec, 120);
        assert_eq!(settings.effective_min_players(), 5);
        assert!(settings.roles_enabled.is_empty());
    }

    #[test]
    fn test_min_players_floor() {
        let settings = GameSettings { min_players: 1, ..Default::default() };
        assert_eq!(settings.effective_min_players(), MIN_PLAYERS_FLOOR);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(GameSettings::default()).unwrap();
        assert_eq!(json["tieRule"], "no-lynch");
        assert_eq!(json["timers"]["discussionSec"], 120);
        assert_eq!(json["aiProvider"], "auto");

        let parsed: GameSettings =
            serde_json::from_str(r#"{"tieRule":"revote","rolesEnabled":{"werewolf":2}}"#).unwrap();
        assert_eq!(parsed.tie_rule, TieRule::Revote);
        assert_eq!(parsed.roles_enabled.get(&RoleId::Werewolf), Some(&2));
        assert_eq!(parsed.timers, Timers::default());
    }

    #[test]
    fn test_villager_count_ignored() {
        let mut settings = GameSettings::default();
        settings.set_role_count(RoleId::Villager, 3);
        assert!(settings.roles_enabled.is_empty());
    }
}
