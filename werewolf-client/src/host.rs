//! Host Driver
//!
//! Runs the authoritative engine on the host device. Each poll it checks
//! the barriers and timers for the current phase, takes at most one engine
//! step, clears the completion set that step consumed, then pushes the
//! new snapshot.
//!
//! Those registry writes are owed until they succeed. A failed write is
//! retried at the top of the next `tick` or `advance`, before any barrier
//! is read again.

use tracing::{debug, info, warn};

use werewolf::game::context::NarratorContext;
use werewolf::game::engine::GameEngine;
use werewolf::game::settings::{GameMode, GameSettings};
use werewolf::game::state::{GameState, Phase, Player, PlayerId};
use werewolf::narrator::judge::{judge_request, parse_verdict};
use werewolf::network::protocol::ErrorCode;
use werewolf::network::room::{RoomPlayer, RoomStateView, TrackingType};

use crate::client::RoomClient;
use crate::transport::TransportError;

/// What one `tick` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStep {
    /// Nothing to do yet.
    Idle,
    /// Every device is ready; the host confirms with `advance`.
    AwaitingHost {
        /// Phase waiting for confirmation.
        phase: &'static str,
    },
    /// The engine moved and the snapshot was pushed.
    Advanced {
        /// Phase before the step.
        from: &'static str,
        /// Phase after the step.
        to: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Waiting,
    NeedsHost,
    Go,
}

impl From<bool> for Readiness {
    fn from(ready: bool) -> Self {
        if ready { Readiness::Go } else { Readiness::Waiting }
    }
}

/// Registry writes the engine is ahead of.
#[derive(Debug, Default)]
struct Owed {
    start_room: bool,
    resets: Vec<TrackingType>,
    push: bool,
}

impl Owed {
    fn is_empty(&self) -> bool {
        !self.start_room && self.resets.is_empty() && !self.push
    }

    fn reset(&mut self, tracking: TrackingType) {
        if !self.resets.contains(&tracking) {
            self.resets.push(tracking);
        }
    }
}

const ALL_TRACKING: [TrackingType; 3] = [TrackingType::Roles, TrackingType::Night, TrackingType::Skip];

/// Drives the engine on the host device.
pub struct HostDriver {
    client: RoomClient,
    engine: GameEngine,
    phase_key: Option<(&'static str, u32)>,
    entered_at: u64,
    owed: Owed,
}

impl HostDriver {
    /// Drive `engine` through `client`.
    pub fn new(client: RoomClient, engine: GameEngine) -> Self {
        Self { client, engine, phase_key: None, entered_at: 0, owed: Owed::default() }
    }

    /// Take over a game from its last snapshot (host transfer).
    pub fn from_snapshot(client: RoomClient, state: GameState) -> Self {
        Self::new(client, GameEngine::from_snapshot(state))
    }

    /// The authoritative engine.
    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// The room client.
    pub fn client(&self) -> &RoomClient {
        &self.client
    }

    /// Whether the registry holds every write the engine made.
    pub fn is_settled(&self) -> bool {
        self.owed.is_empty()
    }

    // =========================================================================
    // HOST ACTIONS
    // =========================================================================

    /// Replace the settings. Lobby only.
    pub fn update_settings(&mut self, settings: GameSettings) -> bool {
        self.engine.update_settings(settings)
    }

    /// Seat the roster, assign roles and publish the first snapshot.
    /// Returns false when the table is too small.
    pub async fn start(&mut self, roster: &[RoomPlayer], now_ms: u64) -> Result<bool, TransportError> {
        self.sync_roster(roster);
        if !self.engine.start_game() {
            debug!(
                "Cannot start with {} players (need {})",
                self.engine.state().players.len(),
                self.engine.state().settings.effective_min_players()
            );
            return Ok(false);
        }

        self.observe(now_ms);
        self.owed.start_room = true;
        for tracking in ALL_TRACKING {
            self.owed.reset(tracking);
        }
        self.owed.push = true;
        self.settle().await?;
        info!("Game {} started in room {}", self.engine.state().id, self.client.room_code());
        Ok(true)
    }

    /// Cast the current voter's ballot (classic mode, passed-around device).
    pub async fn cast_vote(&mut self, target: Option<PlayerId>, now_ms: u64) -> Result<bool, TransportError> {
        if !self.engine.cast_vote_for_current(target) {
            return Ok(false);
        }
        self.observe(now_ms);
        self.owed.push = true;
        self.settle().await?;
        Ok(true)
    }

    /// Start over with an empty lobby.
    pub async fn reset(&mut self, now_ms: u64) -> Result<(), TransportError> {
        self.engine.reset();
        self.observe(now_ms);
        self.owed.start_room = false;
        for tracking in ALL_TRACKING {
            self.owed.reset(tracking);
        }
        self.owed.push = true;
        self.settle().await
    }

    /// Take the current phase's step regardless of barriers and timers.
    pub async fn advance(&mut self, now_ms: u64) -> Result<HostStep, TransportError> {
        self.settle().await?;
        self.step(now_ms).await
    }

    // =========================================================================
    // POLL
    // =========================================================================

    /// React to a fresh room view.
    pub async fn tick(&mut self, view: &RoomStateView, now_ms: u64) -> Result<HostStep, TransportError> {
        self.observe(now_ms);

        // The view predates the owed writes, so its barriers cannot be trusted
        if !self.owed.is_empty() {
            self.settle().await?;
            return Ok(HostStep::Idle);
        }

        if self.engine.phase().is_lobby() {
            self.sync_roster(&view.players);
            return Ok(HostStep::Idle);
        }

        match self.readiness(view, now_ms) {
            Readiness::Waiting => Ok(HostStep::Idle),
            Readiness::NeedsHost => Ok(HostStep::AwaitingHost { phase: self.engine.phase().name() }),
            Readiness::Go => self.step(now_ms).await,
        }
    }

    fn readiness(&self, view: &RoomStateView, now_ms: u64) -> Readiness {
        let settings = &self.engine.state().settings;
        let shown_long_enough =
            now_ms.saturating_sub(self.entered_at) >= settings.timers.display_delay_ms;
        let skipped = view.room.all_voted_skip;

        match self.engine.phase() {
            Phase::RoleAssignment => view.all_roles_revealed.into(),
            Phase::NightStart { .. } => {
                if !view.all_night_actions_complete {
                    Readiness::Waiting
                } else if settings.timers.night_auto_advance {
                    Readiness::Go
                } else {
                    Readiness::NeedsHost
                }
            }
            Phase::DayStart { .. } | Phase::LynchResolve { .. } => shown_long_enough.into(),
            Phase::PlayerTalking { ends_at, .. } => (now_ms >= *ends_at || skipped).into(),
            Phase::Discussion { ends_at, .. } => {
                (ends_at.is_some_and(|t| now_ms >= t) || skipped).into()
            }
            Phase::Voting { .. } => {
                (settings.mode == GameMode::Judge && self.engine.voters_remaining() > 0).into()
            }
            Phase::Lobby | Phase::GameOver { .. } => Readiness::Waiting,
        }
    }

    /// One engine step for the current phase, then tracking reset and push.
    async fn step(&mut self, now_ms: u64) -> Result<HostStep, TransportError> {
        let from = self.engine.phase().name();
        let mode = self.engine.state().settings.mode;

        let phase = self.engine.phase().clone();

        let moved = match phase {
            Phase::RoleAssignment => self.engine.proceed_from_role_reveal(),
            Phase::NightStart { .. } => {
                let actions = self.client.get_night_actions().await?;
                self.engine.apply_night_actions(actions);
                self.engine.resolve_night()
            }
            Phase::DayStart { .. } => match mode {
                GameMode::Judge => self.engine.start_player_talking(now_ms),
                GameMode::Classic => self.engine.start_discussion(now_ms),
            },
            Phase::PlayerTalking { .. } => self.engine.start_discussion(now_ms),
            Phase::Discussion { .. } => self.engine.start_voting(),
            Phase::Voting { .. } => self.judge().await,
            Phase::LynchResolve { .. } => self.engine.continue_after_lynch(),
            Phase::Lobby | Phase::GameOver { .. } => false,
        };
        if !moved {
            return Ok(HostStep::Idle);
        }

        self.observe(now_ms);
        let to = self.engine.phase().name();

        match from {
            "RoleAssignment" => self.owed.reset(TrackingType::Roles),
            "NightStart" => self.owed.reset(TrackingType::Night),
            "PlayerTalking" | "Discussion" => self.owed.reset(TrackingType::Skip),
            _ => {}
        }
        // Every night starts from an empty barrier
        if to == "NightStart" {
            self.owed.reset(TrackingType::Night);
        }
        self.owed.push = true;

        info!("Room {}: {} -> {}", self.client.room_code(), from, to);
        self.settle().await?;
        Ok(HostStep::Advanced { from, to })
    }

    /// Ask the narrator for a verdict and cast every remaining vote for it.
    /// Any narrator failure abstains.
    async fn judge(&mut self) -> bool {
        let state = self.engine.state();
        let context = NarratorContext::from_state(state);
        let alive = context.alive_players.clone();
        let request = judge_request(context, Some(state.settings.ai_provider.clone()));

        let target = match self.client.narrate(&request).await {
            Ok(response) => {
                let verdict = parse_verdict(&response.answer, &alive);
                info!("Judge ({}) verdict: {:?}", response.provider, verdict);
                verdict
            }
            Err(e) => {
                warn!("Judge unavailable, abstaining: {}", e);
                None
            }
        };
        self.engine.cast_all_remaining(target)
    }

    /// Send the owed registry writes, snapshot last. Stops at the first
    /// failure and keeps the rest for the next call.
    async fn settle(&mut self) -> Result<(), TransportError> {
        if self.owed.start_room {
            self.client.start_game().await?;
            self.owed.start_room = false;
        }
        while let Some(&tracking) = self.owed.resets.first() {
            self.client.reset_phase_tracking(tracking).await?;
            self.owed.resets.remove(0);
        }
        if self.owed.push {
            match self.client.update_game_state(self.engine.snapshot()).await {
                Ok(version) => {
                    debug!("Pushed snapshot v{}", version);
                    self.owed.push = false;
                }
                Err(e) if e.code() == Some(ErrorCode::StaleSnapshot) => {
                    // Retrying the same version cannot succeed
                    warn!("Registry holds a newer snapshot: {}", e);
                    self.owed.push = false;
                    return Err(e);
                }
                Err(e) => {
                    debug!("Snapshot push failed, will retry: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn sync_roster(&mut self, roster: &[RoomPlayer]) {
        let players: Vec<Player> = roster.iter()
            .map(|p| Player::new(p.id.clone(), p.name.clone(), p.avatar_data_url.clone()))
            .collect();
        self.engine.sync_roster(&players);
    }

    /// Restart the display clock when the phase changes.
    fn observe(&mut self, now_ms: u64) {
        let key = (self.engine.phase().name(), self.engine.state().round);
        if self.phase_key != Some(key) {
            self.phase_key = Some(key);
            self.entered_at = now_ms;
        }
    }
}
