//! Game Engine
//!
//! Phase transitions over [`GameState`]. Every operation either applies
//! completely or leaves the state untouched and returns `false`; the engine
//! never errors, callers gate what they call.
//!
//! ```text
//! Lobby → RoleAssignment → NightStart → DayStart
//!       → {PlayerTalking → Discussion | Discussion} → Voting
//!       → LynchResolve → (NightStart | GameOver)
//! ```
//!
//! Time is passed in explicitly (`now_ms`), so a replay with the same inputs
//! yields the same snapshot.

use std::collections::BTreeMap;

use crate::core::rng::{DeterministicRng, derive_round_seed};
use crate::game::events::EventLogItem;
use crate::game::roles::assign_roles;
use crate::game::settings::{GameSettings, TieRule};
use crate::game::state::{GameState, NightActions, Phase, Player, PlayerId, RoleReveal};
use crate::game::vote::{Tally, VoteOutcome};

/// Host-side owner of the authoritative game state.
#[derive(Clone, Debug)]
pub struct GameEngine {
    state: GameState,
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine {
    /// New lobby with a random id and seed.
    pub fn new() -> Self {
        Self::with_seed(new_game_id(), rand::random())
    }

    /// New lobby with a fixed id and seed.
    pub fn with_seed(id: impl Into<String>, seed: u32) -> Self {
        Self { state: GameState::new(id, seed) }
    }

    /// Resume from a snapshot, e.g. after a host handover.
    pub fn from_snapshot(state: GameState) -> Self {
        Self { state }
    }

    /// Current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy for pushing to the registry.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Consume into the state.
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    fn touch(&mut self) -> bool {
        self.state.version += 1;
        true
    }

    fn next_seq(&self) -> usize {
        self.state.event_log.len()
    }

    fn eliminate(&mut self, id: &PlayerId) {
        if let Some(player) = self.state.player_mut(id) {
            player.alive = false;
        }
    }

    // =========================================================================
    // LOBBY
    // =========================================================================

    /// Replace settings. Lobby only.
    pub fn update_settings(&mut self, settings: GameSettings) -> bool {
        if !self.state.phase.is_lobby() {
            return false;
        }
        self.state.settings = settings;
        self.touch()
    }

    /// Add a player with a generated id. Lobby only.
    pub fn add_player(&mut self, name: impl Into<String>, avatar: Option<String>) -> Option<PlayerId> {
        let id = PlayerId::generate();
        self.add_player_with_id(id.clone(), name, avatar).then_some(id)
    }

    /// Add a player with a known id (e.g. from the room roster). Lobby only;
    /// an id already seated is rejected.
    pub fn add_player_with_id(
        &mut self,
        id: PlayerId,
        name: impl Into<String>,
        avatar: Option<String>,
    ) -> bool {
        if !self.state.phase.is_lobby() || self.state.player(&id).is_some() {
            return false;
        }
        self.state.players.push(Player::new(id, name, avatar));
        self.touch()
    }

    /// Remove a player. Lobby only.
    pub fn remove_player(&mut self, id: &PlayerId) -> bool {
        if !self.state.phase.is_lobby() {
            return false;
        }
        let before = self.state.players.len();
        self.state.players.retain(|p| &p.id != id);
        if self.state.players.len() == before {
            return false;
        }
        self.touch()
    }

    /// Make the seated players match `roster` (same ids, same order).
    /// Lobby only.
    pub fn sync_roster(&mut self, roster: &[Player]) -> bool {
        if !self.state.phase.is_lobby() {
            return false;
        }
        let same = roster.len() == self.state.players.len()
            && roster.iter().zip(&self.state.players).all(|(a, b)| a.id == b.id && a.name == b.name);
        if same {
            return false;
        }
        self.state.players = roster.iter()
            .map(|p| Player::new(p.id.clone(), p.name.clone(), p.avatar_data_url.clone()))
            .collect();
        self.touch()
    }

    /// Whether `start_game` would apply.
    pub fn can_start(&self) -> bool {
        self.state.phase.is_lobby()
            && self.state.players.len() >= self.state.settings.effective_min_players()
    }

    /// Assign roles and move to `RoleAssignment`, round 1.
    pub fn start_game(&mut self) -> bool {
        if !self.can_start() {
            return false;
        }
        let players = assign_roles(&self.state.players, &self.state.settings, self.state.seed);
        self.state.role_reveal = RoleReveal {
            order: players.iter().map(|p| p.id.clone()).collect(),
            index: 0,
        };
        self.state.players = players;
        self.state.phase = Phase::RoleAssignment;
        self.state.round = 1;
        self.state.night_actions = NightActions::default();
        self.state.event_log.clear();
        self.touch()
    }

    // =========================================================================
    // ROLE REVEAL
    // =========================================================================

    /// Advance the reveal cursor; stays on the last player.
    pub fn next_role_reveal(&mut self) -> bool {
        if self.state.phase != Phase::RoleAssignment {
            return false;
        }
        let reveal = &mut self.state.role_reveal;
        if reveal.index + 1 >= reveal.order.len() {
            return false;
        }
        reveal.index += 1;
        self.touch()
    }

    /// Enter the first night. The caller checks that every device has
    /// acknowledged its role.
    pub fn proceed_from_role_reveal(&mut self) -> bool {
        if self.state.phase != Phase::RoleAssignment {
            return false;
        }
        self.state.phase = Phase::NightStart { round: self.state.round };
        self.state.night_actions = NightActions::default();
        self.touch()
    }

    // =========================================================================
    // NIGHT
    // =========================================================================

    fn set_night_action(&mut self, apply: impl FnOnce(&mut NightActions)) -> bool {
        if !matches!(self.state.phase, Phase::NightStart { .. }) {
            return false;
        }
        apply(&mut self.state.night_actions);
        self.touch()
    }

    /// Set the protected player (last write wins).
    pub fn choose_protect(&mut self, id: Option<PlayerId>) -> bool {
        self.set_night_action(|a| a.protect_id = id)
    }

    /// Set the protected player on behalf of `medic`, honoring
    /// `allow_self_protect`.
    pub fn choose_protect_by(&mut self, medic: &PlayerId, id: Option<PlayerId>) -> bool {
        if !self.state.settings.allow_self_protect && id.as_ref() == Some(medic) {
            return false;
        }
        self.choose_protect(id)
    }

    /// Set the kill target (last write wins).
    pub fn choose_kill(&mut self, id: Option<PlayerId>) -> bool {
        self.set_night_action(|a| a.kill_target_id = id)
    }

    /// Set the peek target (last write wins).
    pub fn choose_peek(&mut self, id: Option<PlayerId>) -> bool {
        self.set_night_action(|a| a.peek_target_id = id)
    }

    /// Take all three night targets at once, e.g. aggregated by the registry.
    pub fn apply_night_actions(&mut self, actions: NightActions) -> bool {
        self.set_night_action(|a| *a = actions)
    }

    /// Resolve the night and move to `DayStart`.
    ///
    /// Log order: `peek`, `protected`, then exactly one of `night_kill` or
    /// `no_kill`.
    pub fn resolve_night(&mut self) -> bool {
        let Phase::NightStart { round } = self.state.phase else {
            return false;
        };
        let actions = self.state.night_actions.clone();
        let killed = actions.killed().cloned();

        if let Some(peek) = actions.peek_target_id {
            let item = EventLogItem::peek(self.next_seq(), round, peek);
            self.state.event_log.push(item);
        }
        if let Some(protect) = actions.protect_id {
            let item = EventLogItem::protected(self.next_seq(), round, protect);
            self.state.event_log.push(item);
        }
        match killed {
            Some(id) => {
                self.eliminate(&id);
                let item = EventLogItem::night_kill(self.next_seq(), round, id);
                self.state.event_log.push(item);
            }
            None => {
                let item = EventLogItem::no_kill(self.next_seq(), round);
                self.state.event_log.push(item);
            }
        }

        self.state.phase = Phase::DayStart { round };
        self.touch()
    }

    // =========================================================================
    // DAY
    // =========================================================================

    /// Free player talk until `now_ms + player_talking_sec`.
    pub fn start_player_talking(&mut self, now_ms: u64) -> bool {
        let Phase::DayStart { round } = self.state.phase else {
            return false;
        };
        let ends_at = self
            .state
            .settings
            .timers
            .player_talking_sec
            .saturating_mul(1000)
            .saturating_add(now_ms);
        self.state.phase = Phase::PlayerTalking { round, ends_at };
        self.touch()
    }

    /// Timed discussion until `now_ms + discussion_sec`.
    pub fn start_discussion(&mut self, now_ms: u64) -> bool {
        let round = match self.state.phase {
            Phase::DayStart { round } | Phase::PlayerTalking { round, .. } => round,
            _ => return false,
        };
        let ends_at = self
            .state
            .settings
            .timers
            .discussion_sec
            .saturating_mul(1000)
            .saturating_add(now_ms);
        self.state.phase = Phase::Discussion { round, ends_at: Some(ends_at) };
        self.touch()
    }

    /// Queue every alive player, in seat order, to vote.
    pub fn start_voting(&mut self) -> bool {
        let round = match self.state.phase {
            Phase::DayStart { round }
            | Phase::PlayerTalking { round, .. }
            | Phase::Discussion { round, .. } => round,
            _ => return false,
        };
        self.open_ballot(round, None);
        self.touch();
        if self.voters_remaining() == 0 {
            self.resolve_vote();
        }
        true
    }

    fn open_ballot(&mut self, round: u32, candidates: Option<Vec<PlayerId>>) {
        let voter_queue: Vec<PlayerId> = self.state.alive_players().map(|p| p.id.clone()).collect();
        let votes: BTreeMap<PlayerId, Option<PlayerId>> =
            voter_queue.iter().map(|id| (id.clone(), None)).collect();
        self.state.phase = Phase::Voting {
            round,
            voter_queue,
            current_index: 0,
            votes,
            candidates,
        };
    }

    /// Voters who have not voted yet.
    pub fn voters_remaining(&self) -> usize {
        match &self.state.phase {
            Phase::Voting { voter_queue, current_index, .. } => {
                voter_queue.len().saturating_sub(*current_index)
            }
            _ => 0,
        }
    }

    /// Player whose vote is next.
    pub fn current_voter(&self) -> Option<&PlayerId> {
        match &self.state.phase {
            Phase::Voting { voter_queue, current_index, .. } => voter_queue.get(*current_index),
            _ => None,
        }
    }

    /// Record the current voter's choice (`None` abstains) and move on.
    /// The last vote resolves the ballot.
    pub fn cast_vote_for_current(&mut self, target: Option<PlayerId>) -> bool {
        let Phase::Voting { voter_queue, current_index, votes, .. } = &mut self.state.phase else {
            return false;
        };
        let Some(voter) = voter_queue.get(*current_index) else {
            return false;
        };
        votes.insert(voter.clone(), target);
        *current_index += 1;
        let done = *current_index >= voter_queue.len();

        self.touch();
        if done {
            self.resolve_vote();
        }
        true
    }

    /// Cast the same choice for every remaining voter (judge mode).
    pub fn cast_all_remaining(&mut self, target: Option<PlayerId>) -> bool {
        let mut applied = false;
        while self.voters_remaining() > 0 {
            applied |= self.cast_vote_for_current(target.clone());
        }
        applied
    }

    /// Tally the ballot and apply the tie rule.
    pub fn resolve_vote(&mut self) -> bool {
        let Phase::Voting { round, voter_queue, votes, candidates, .. } = &self.state.phase else {
            return false;
        };
        let round = *round;
        let is_revote = candidates.is_some();
        let outcome = Tally::count(voter_queue, votes, candidates.as_deref()).outcome();

        let lynched = match outcome {
            VoteOutcome::NoVotes => None,
            VoteOutcome::Leader(id) => Some(id),
            VoteOutcome::Tie(tied) => {
                let tied = self.in_seat_order(&tied);
                match self.state.settings.tie_rule {
                    TieRule::NoLynch => None,
                    TieRule::Revote if !is_revote => {
                        self.open_ballot(round, Some(tied));
                        return self.touch();
                    }
                    TieRule::Revote => None,
                    TieRule::Random => {
                        let mut rng = DeterministicRng::new(derive_round_seed(self.state.seed, round, b"tie"));
                        rng.choose(&tied).cloned()
                    }
                }
            }
        };

        if let Some(id) = lynched {
            self.eliminate(&id);
            let item = EventLogItem::lynch(self.next_seq(), round, id);
            self.state.event_log.push(item);
        }
        self.state.phase = Phase::LynchResolve { round };
        self.touch()
    }

    fn in_seat_order(&self, ids: &[PlayerId]) -> Vec<PlayerId> {
        self.state.players.iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Check the win condition; end the game or start the next night.
    pub fn continue_after_lynch(&mut self) -> bool {
        if !matches!(self.state.phase, Phase::LynchResolve { .. }) {
            return false;
        }
        match self.state.winner() {
            Some(winners) => {
                self.state.phase = Phase::GameOver { winners };
            }
            None => {
                self.state.round += 1;
                self.state.phase = Phase::NightStart { round: self.state.round };
                self.state.night_actions = NightActions::default();
            }
        }
        self.touch()
    }

    // =========================================================================
    // RESET
    // =========================================================================

    /// Back to an empty lobby with a new id and seed.
    pub fn reset(&mut self) {
        self.reset_with(new_game_id(), rand::random());
    }

    /// Reset with a fixed id and seed. The version keeps counting up so a
    /// mirror never mistakes the new lobby for stale data.
    pub fn reset_with(&mut self, id: impl Into<String>, seed: u32) {
        let version = self.state.version;
        self.state = GameState::new(id, seed);
        self.state.version = version;
        self.touch();
    }
}

fn new_game_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
