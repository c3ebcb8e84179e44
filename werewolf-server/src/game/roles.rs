//! Roles and Role Assignment
//!
//! Role definitions, the role-count policy, and seeded assignment.

use serde::{Serialize, Deserialize};

use crate::core::rng::{DeterministicRng, shuffled};
use crate::game::settings::GameSettings;
use crate::game::state::Player;

/// A player's hidden role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    /// Town, no night action.
    Villager,
    /// Wolf, chooses a kill target at night.
    Werewolf,
    /// Town, peeks at one player's alignment at night.
    Seer,
    /// Town, protects one player at night.
    Medic,
}

/// Which side a role plays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Villagers, seer, medic.
    Town,
    /// Werewolves.
    Wolf,
}

/// Static description of a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleDef {
    /// Role identifier.
    pub id: RoleId,
    /// Display name.
    pub name: &'static str,
    /// Alignment.
    pub alignment: Alignment,
    /// Whether the role acts during the night.
    pub acts_at_night: bool,
    /// Conceptually at most one per game (counts are not enforced).
    pub unique_per_game: bool,
}

/// All roles in assignment order.
pub const ALL_ROLES: [RoleId; 4] = [RoleId::Werewolf, RoleId::Seer, RoleId::Medic, RoleId::Villager];

impl RoleId {
    /// Static definition for this role.
    pub const fn def(self) -> RoleDef {
        match self {
            RoleId::Villager => RoleDef {
                id: RoleId::Villager,
                name: "Villager",
                alignment: Alignment::Town,
                acts_at_night: false,
                unique_per_game: false,
            },
            RoleId::Werewolf => RoleDef {
                id: RoleId::Werewolf,
                name: "Werewolf",
                alignment: Alignment::Wolf,
                acts_at_night: true,
                unique_per_game: false,
            },
            RoleId::Seer => RoleDef {
                id: RoleId::Seer,
                name: "Seer",
                alignment: Alignment::Town,
                acts_at_night: true,
                unique_per_game: true,
            },
            RoleId::Medic => RoleDef {
                id: RoleId::Medic,
                name: "Medic",
                alignment: Alignment::Town,
                acts_at_night: true,
                unique_per_game: true,
            },
        }
    }

    /// Alignment shortcut.
    pub const fn alignment(self) -> Alignment {
        self.def().alignment
    }

    /// Parse the wire name (`villager`, `werewolf`, `seer`, `medic`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "villager" => Some(RoleId::Villager),
            "werewolf" => Some(RoleId::Werewolf),
            "seer" => Some(RoleId::Seer),
            "medic" => Some(RoleId::Medic),
            _ => None,
        }
    }
}

// =============================================================================
// ROLE COUNTS
// =============================================================================

/// Number of each special role in a game. Everyone else is a villager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleCounts {
    /// Werewolves.
    pub werewolves: usize,
    /// Seers.
    pub seers: usize,
    /// Medics.
    pub medics: usize,
}

impl RoleCounts {
    /// Sum of special roles.
    pub fn special(&self) -> usize {
        self.werewolves + self.seers + self.medics
    }

    /// Villagers left over for `players`.
    pub fn villagers(&self, players: usize) -> usize {
        players.saturating_sub(self.special())
    }

    /// Automatic counts: a quarter of the table are werewolves (rounded half
    /// up, at least one), plus a seer and a medic from six players upward.
    pub fn auto(players: usize) -> Self {
        let extras = usize::from(players >= 6);
        Self {
            werewolves: ((players + 2) / 4).max(1),
            seers: extras,
            medics: extras,
        }
    }

    /// Counts for `players` under `settings`: explicit overrides win over the
    /// automatic formula, then the result is clamped to fit.
    pub fn for_game(players: usize, settings: &GameSettings) -> Self {
        let auto = Self::auto(players);
        let pick = |role: RoleId, fallback: usize| {
            settings.roles_enabled.get(&role).copied().unwrap_or(fallback)
        };
        let requested = Self {
            werewolves: pick(RoleId::Werewolf, auto.werewolves),
            seers: pick(RoleId::Seer, auto.seers),
            medics: pick(RoleId::Medic, auto.medics),
        };
        requested.clamped(players)
    }

    /// Reduce seer, then medic, then extra werewolves until the special roles
    /// fit the table. Werewolves never drop below one and never fill the
    /// whole table.
    pub fn clamped(mut self, players: usize) -> Self {
        self.werewolves = self.werewolves.max(1).min(players.saturating_sub(1).max(1));

        while self.special() > players {
            if self.seers > 0 {
                self.seers -= 1;
            } else if self.medics > 0 {
                self.medics -= 1;
            } else if self.werewolves > 1 {
                self.werewolves -= 1;
            } else {
                break;
            }
        }
        self
    }

    /// Role list in assignment order, padded with villagers to `players`.
    pub fn to_roles(&self, players: usize) -> Vec<RoleId> {
        let mut roles = Vec::with_capacity(players);
        roles.extend(std::iter::repeat(RoleId::Werewolf).take(self.werewolves));
        roles.extend(std::iter::repeat(RoleId::Seer).take(self.seers));
        roles.extend(std::iter::repeat(RoleId::Medic).take(self.medics));
        roles.truncate(players);
        roles.resize(players, RoleId::Villager);
        roles
    }
}

/// Assign roles to `players` with the seeded shuffle.
///
/// The players are shuffled, the role list is dealt in order, and the result
/// is returned in the original player order. Every player comes back alive.
pub fn assign_roles(players: &[Player], settings: &GameSettings, seed: u32) -> Vec<Player> {
    let counts = RoleCounts::for_game(players.len(), settings);
    let roles = counts.to_roles(players.len());

    let mut rng = DeterministicRng::new(seed);
    let order: Vec<usize> = (0..players.len()).collect();
    let dealt = shuffled(&order, &mut rng);

    let mut assigned: Vec<Player> = players.to_vec();
    for (slot, &player_idx) in dealt.iter().enumerate() {
        if let Some(player) = assigned.get_mut(player_idx) {
            player.role = roles.get(slot).copied();
            player.alive = true;
        }
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;

    fn table(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(PlayerId::new(format!("p{}", i)), format!("Player {}", i), None))
            .collect()
    }

    fn count(players: &[Player], role: RoleId) -> usize {
        players.iter().filter(|p| p.role == Some(role)).count()
    }

    #[test]
    fn test_auto_counts() {
        assert_eq!(RoleCounts::auto(3), RoleCounts { werewolves: 1, seers: 0, medics: 0 });
        assert_eq!(RoleCounts::auto(5), RoleCounts { werewolves: 1, seers: 0, medics: 0 });
        assert_eq!(RoleCounts::auto(6), RoleCounts { werewolves: 2, seers: 1, medics: 1 });
        assert_eq!(RoleCounts::auto(10), RoleCounts { werewolves: 3, seers: 1, medics: 1 });
        assert_eq!(RoleCounts::auto(12), RoleCounts { werewolves: 3, seers: 1, medics: 1 });
    }

    #[test]
    fn test_clamp_order() {
        let requested = RoleCounts { werewolves: 2, seers: 1, medics: 1 };
        // 4 special roles on 3 players: the seer goes first
        assert_eq!(requested.clamped(3), RoleCounts { werewolves: 2, seers: 0, medics: 1 });
        // then medics, then werewolves
        assert_eq!(requested.clamped(2), RoleCounts { werewolves: 1, seers: 0, medics: 1 });
        let greedy = RoleCounts { werewolves: 5, seers: 2, medics: 2 };
        assert_eq!(greedy.clamped(3), RoleCounts { werewolves: 2, seers: 0, medics: 1 });
        let wolves_only = RoleCounts { werewolves: 4, seers: 0, medics: 0 };
        assert_eq!(wolves_only.clamped(4), RoleCounts { werewolves: 3, seers: 0, medics: 0 });
    }

    #[test]
    fn test_clamp_keeps_one_wolf() {
        let none = RoleCounts { werewolves: 0, seers: 0, medics: 0 };
        assert_eq!(none.clamped(5).werewolves, 1);
    }

    #[test]
    fn test_overrides_win_over_auto() {
        let mut settings = GameSettings::default();
        settings.roles_enabled.insert(RoleId::Seer, 1);
        let counts = RoleCounts::for_game(5, &settings);
        assert_eq!(counts, RoleCounts { werewolves: 1, seers: 1, medics: 0 });
    }

    #[test]
    fn test_five_players_default() {
        let players = assign_roles(&table(5), &GameSettings::default(), 42);
        assert_eq!(count(&players, RoleId::Werewolf), 1);
        assert_eq!(count(&players, RoleId::Seer), 0);
        assert_eq!(count(&players, RoleId::Medic), 0);
        assert_eq!(count(&players, RoleId::Villager), 4);
    }

    #[test]
    fn test_assignment_keeps_player_order() {
        let input = table(8);
        let players = assign_roles(&input, &GameSettings::default(), 7);
        let ids: Vec<_> = players.iter().map(|p| p.id.clone()).collect();
        let expected: Vec<_> = input.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, expected);
        assert!(players.iter().all(|p| p.role.is_some() && p.alive));
    }

    #[test]
    fn test_assignment_determinism() {
        let a = assign_roles(&table(9), &GameSettings::default(), 1234);
        let b = assign_roles(&table(9), &GameSettings::default(), 1234);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(RoleId::parse("Werewolf"), Some(RoleId::Werewolf));
        assert_eq!(RoleId::parse("wizard"), None);
        assert_eq!(RoleId::Seer.alignment(), Alignment::Town);
    }
}
