//! Room Records
//!
//! One room: roster, host, the latest pushed snapshot, and the per-device
//! completion sets that act as barriers. No engine logic lives here.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;

use crate::core::hash::{snapshot_hash, short_hex};
use crate::game::roles::RoleId;
use crate::game::state::{GameState, NightActions, PlayerId};
use crate::network::room_code::RoomCode;

/// Stable per-device identifier chosen by the client.
pub type DeviceId = String;

/// Capacity of each room's notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// RECORD TYPES
// =============================================================================

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    /// Gathering players.
    Lobby,
    /// A game is running.
    Playing,
}

/// A device seated in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Owning device.
    pub device_id: DeviceId,
    /// Avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_data_url: Option<String>,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
}

/// Night action types a device can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightActionKind {
    /// Werewolf kill.
    Kill,
    /// Medic protection.
    Protect,
    /// Seer peek.
    Peek,
}

/// One device's submitted night action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightSubmission {
    /// Role the device claims to act as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,
    /// Action type.
    pub action: NightActionKind,
    /// Target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<PlayerId>,
    /// Arrival order of the device's first submission this night.
    pub seq: u64,
}

/// Which completion set to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingType {
    /// Night actions (also clears submitted actions).
    Night,
    /// Role reveal acknowledgements.
    Roles,
    /// Skip votes.
    Skip,
}

/// Barrier progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Devices done.
    pub completed: usize,
    /// Devices expected.
    pub total: usize,
}

impl Progress {
    /// Whether every expected device is done.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

/// Skip-vote totals against alive players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipVoteSummary {
    /// Devices that voted to skip.
    pub skip_votes: usize,
    /// Whether every alive player voted to skip.
    pub all_voted_skip: bool,
    /// Alive players, or the roster size before any snapshot.
    pub total_alive_players: usize,
}

/// Full room view returned by `get_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    /// Roster in join order.
    pub players: Vec<RoomPlayer>,
    /// Last pushed snapshot.
    pub game_state: Option<GameState>,
    /// Room lifecycle.
    pub game_phase: RoomPhase,
    /// Current host.
    pub host_id: PlayerId,
    /// Devices done with night actions.
    pub night_actions_complete: usize,
    /// Devices that saw their role.
    pub roles_revealed: usize,
    /// Night barrier.
    pub all_night_actions_complete: bool,
    /// Role reveal barrier.
    pub all_roles_revealed: bool,
    /// Skip vote barrier.
    pub room: SkipVoteSummary,
    /// Digest of the snapshot, for cheap comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
}

/// Notifications pushed to subscribers of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    /// The host pushed a new snapshot.
    Snapshot {
        /// Snapshot version.
        version: u64,
        /// Phase name.
        phase: String,
    },
    /// Someone joined or left, or the host changed.
    Roster {
        /// Roster in join order.
        players: Vec<RoomPlayer>,
        /// Current host.
        host_id: PlayerId,
    },
    /// A barrier moved.
    Barrier {
        /// Which set.
        tracking: TrackingType,
        /// Progress.
        progress: Progress,
    },
    /// The room was deleted.
    Closed,
}

/// Outcome of a device leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// A player was removed.
    pub removed: bool,
    /// New host, if the host left.
    pub new_host: Option<PlayerId>,
    /// The roster is now empty.
    pub empty: bool,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// Unknown room code.
    #[error("Room not found")]
    NotFound,

    /// A non-host tried a host-only action.
    #[error("Only the host can {0}")]
    NotHost(&'static str),

    /// The snapshot is not newer than the stored one.
    #[error("Stale snapshot: version {offered} is not newer than {current}")]
    StaleSnapshot {
        /// Version sent.
        offered: u64,
        /// Version stored.
        current: u64,
    },

    /// Too many live rooms.
    #[error("Room limit reached")]
    Capacity,

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// ROOM
// =============================================================================

/// A room record.
pub struct Room {
    /// Room code.
    pub code: RoomCode,
    /// Current host.
    host_id: PlayerId,
    /// Roster in join order.
    players: Vec<RoomPlayer>,
    /// Lifecycle.
    phase: RoomPhase,
    /// Last pushed snapshot.
    game_state: Option<GameState>,
    /// Digest of `game_state`.
    state_hash: Option<String>,
    night_actions_complete: BTreeSet<DeviceId>,
    roles_revealed: BTreeSet<DeviceId>,
    night_actions: BTreeMap<DeviceId, NightSubmission>,
    skip_votes: BTreeSet<DeviceId>,
    next_seq: u64,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    last_activity: Instant,
    event_tx: broadcast::Sender<RoomEvent>,
}

impl Room {
    /// Create a room with `host` as its only player.
    pub fn new(code: RoomCode, host: RoomPlayer) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            code,
            host_id: host.id.clone(),
            players: vec![host],
            phase: RoomPhase::Lobby,
            game_state: None,
            state_hash: None,
            night_actions_complete: BTreeSet::new(),
            roles_revealed: BTreeSet::new(),
            night_actions: BTreeMap::new(),
            skip_votes: BTreeSet::new(),
            next_seq: 0,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            event_tx,
        }
    }

    /// Record activity.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Whether the room saw no activity for `timeout` as of `now`.
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Roster in join order.
    pub fn players(&self) -> &[RoomPlayer] {
        &self.players
    }

    /// Current host.
    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    /// Lifecycle.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Last pushed snapshot.
    pub fn game_state(&self) -> Option<&GameState> {
        self.game_state.as_ref()
    }

    /// Subscribe to room notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.event_tx.subscribe()
    }

    /// Tell subscribers the room is going away.
    pub fn close(&self) {
        self.notify(RoomEvent::Closed);
    }

    fn notify(&self, event: RoomEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn notify_roster(&self) {
        self.notify(RoomEvent::Roster {
            players: self.players.clone(),
            host_id: self.host_id.clone(),
        });
    }

    /// Player seated from `device_id`.
    pub fn player_by_device(&self, device_id: &str) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.device_id == device_id)
    }

    /// Whether `device_id` owns the host seat.
    pub fn is_host_device(&self, device_id: &str) -> bool {
        self.player_by_device(device_id).is_some_and(|p| p.id == self.host_id)
    }

    fn require_host(&self, device_id: &str, action: &'static str) -> Result<(), RoomError> {
        if self.is_host_device(device_id) {
            Ok(())
        } else {
            Err(RoomError::NotHost(action))
        }
    }

    /// Seat a device, or return its existing seat. The flag is true for a
    /// new seat.
    pub fn join(
        &mut self,
        name: &str,
        device_id: &str,
        avatar: Option<String>,
    ) -> (RoomPlayer, bool) {
        if let Some(existing) = self.player_by_device(device_id) {
            return (existing.clone(), false);
        }
        let player = new_room_player(name, device_id, avatar);
        self.players.push(player.clone());
        self.notify_roster();
        (player, true)
    }

    /// Remove the device's seat and any barrier marks it holds. The host
    /// seat passes to the first remaining player.
    pub fn leave(&mut self, device_id: &str) -> LeaveOutcome {
        let Some(pos) = self.players.iter().position(|p| p.device_id == device_id) else {
            return LeaveOutcome { removed: false, new_host: None, empty: self.players.is_empty() };
        };
        let leaving = self.players.remove(pos);

        self.night_actions_complete.remove(device_id);
        self.roles_revealed.remove(device_id);
        self.night_actions.remove(device_id);
        self.skip_votes.remove(device_id);

        let mut new_host = None;
        if leaving.id == self.host_id {
            if let Some(next) = self.players.first() {
                self.host_id = next.id.clone();
                new_host = Some(next.id.clone());
            }
        }

        let empty = self.players.is_empty();
        if empty {
            self.notify(RoomEvent::Closed);
        } else {
            self.notify_roster();
        }
        LeaveOutcome { removed: true, new_host, empty }
    }

    /// Host starts the game.
    pub fn start_game(&mut self, device_id: &str) -> Result<(), RoomError> {
        self.require_host(device_id, "start the game")?;
        self.phase = RoomPhase::Playing;
        Ok(())
    }

    /// Host replaces the snapshot. A snapshot of the same game must carry
    /// a strictly higher version.
    pub fn update_game_state(&mut self, device_id: &str, snapshot: GameState) -> Result<u64, RoomError> {
        self.require_host(device_id, "update the game state")?;

        if let Some(current) = &self.game_state {
            if current.id == snapshot.id && snapshot.version <= current.version {
                return Err(RoomError::StaleSnapshot {
                    offered: snapshot.version,
                    current: current.version,
                });
            }
        }

        let hash = snapshot_hash(snapshot.version, &snapshot)
            .map_err(|e| RoomError::Internal(e.to_string()))?;
        let version = snapshot.version;
        let phase = snapshot.phase.name().to_string();

        self.state_hash = Some(short_hex(&hash));
        self.game_state = Some(snapshot);
        self.phase = RoomPhase::Playing;
        self.notify(RoomEvent::Snapshot { version, phase });
        Ok(version)
    }

    /// Mark a device's night actions complete.
    pub fn mark_night_action_complete(&mut self, device_id: &str) -> Progress {
        self.night_actions_complete.insert(device_id.to_string());
        let progress = self.night_progress();
        self.notify(RoomEvent::Barrier { tracking: TrackingType::Night, progress });
        progress
    }

    /// Mark a device's role as revealed.
    pub fn mark_role_revealed(&mut self, device_id: &str) -> Progress {
        self.roles_revealed.insert(device_id.to_string());
        let progress = self.roles_progress();
        self.notify(RoomEvent::Barrier { tracking: TrackingType::Roles, progress });
        progress
    }

    /// Host clears one completion set.
    pub fn reset_tracking(&mut self, device_id: &str, tracking: TrackingType) -> Result<(), RoomError> {
        self.require_host(device_id, "reset phase tracking")?;
        match tracking {
            TrackingType::Night => {
                self.night_actions_complete.clear();
                self.night_actions.clear();
                self.next_seq = 0;
            }
            TrackingType::Roles => self.roles_revealed.clear(),
            TrackingType::Skip => self.skip_votes.clear(),
        }
        Ok(())
    }

    /// Store or replace a device's night action. A replacement keeps the
    /// device's original arrival order. Returns the number of submissions.
    pub fn submit_night_action(
        &mut self,
        device_id: &str,
        role: Option<RoleId>,
        action: NightActionKind,
        target_id: Option<PlayerId>,
    ) -> usize {
        let seq = match self.night_actions.get(device_id) {
            Some(previous) => previous.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.night_actions.insert(device_id.to_string(), NightSubmission {
            role,
            action,
            target_id,
            seq,
        });
        self.night_actions.len()
    }

    /// Combine submissions into one set of night targets.
    ///
    /// Per action type the target with the most submissions wins; a tie
    /// goes to the target whose first submission arrived earliest.
    pub fn aggregate_night_actions(&self) -> NightActions {
        NightActions {
            protect_id: self.consensus(NightActionKind::Protect),
            kill_target_id: self.consensus(NightActionKind::Kill),
            peek_target_id: self.consensus(NightActionKind::Peek),
        }
    }

    fn consensus(&self, kind: NightActionKind) -> Option<PlayerId> {
        let mut submissions: Vec<&NightSubmission> = self.night_actions.values()
            .filter(|s| s.action == kind)
            .collect();
        submissions.sort_by_key(|s| s.seq);

        // (target, supporters, first arrival)
        let mut counts: Vec<(&PlayerId, usize, u64)> = Vec::new();
        for submission in submissions {
            let Some(target) = &submission.target_id else { continue };
            match counts.iter_mut().find(|(t, _, _)| *t == target) {
                Some(entry) => entry.1 += 1,
                None => counts.push((target, 1, submission.seq)),
            }
        }

        counts.into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
            .map(|(target, _, _)| target.clone())
    }

    /// Record a skip vote.
    pub fn vote_skip(&mut self, device_id: &str) -> SkipVoteSummary {
        self.skip_votes.insert(device_id.to_string());
        let summary = self.skip_summary();
        self.notify(RoomEvent::Barrier {
            tracking: TrackingType::Skip,
            progress: Progress {
                completed: summary.skip_votes,
                total: summary.total_alive_players,
            },
        });
        summary
    }

    /// Skip-vote totals. Counts alive players from the snapshot when there
    /// is one, otherwise the whole roster.
    pub fn skip_summary(&self) -> SkipVoteSummary {
        let total = match &self.game_state {
            Some(state) if !state.players.is_empty() => state.alive_count(),
            _ => self.players.len(),
        };
        let skip_votes = self.skip_votes.len();
        SkipVoteSummary {
            skip_votes,
            all_voted_skip: total > 0 && skip_votes >= total,
            total_alive_players: total,
        }
    }

    /// Night barrier progress.
    pub fn night_progress(&self) -> Progress {
        Progress { completed: self.night_actions_complete.len(), total: self.players.len() }
    }

    /// Role reveal barrier progress.
    pub fn roles_progress(&self) -> Progress {
        Progress { completed: self.roles_revealed.len(), total: self.players.len() }
    }

    /// View for `get_state`.
    pub fn state_view(&self) -> RoomStateView {
        let night = self.night_progress();
        let roles = self.roles_progress();
        RoomStateView {
            players: self.players.clone(),
            game_state: self.game_state.clone(),
            game_phase: self.phase,
            host_id: self.host_id.clone(),
            night_actions_complete: night.completed,
            roles_revealed: roles.completed,
            all_night_actions_complete: night.is_complete(),
            all_roles_revealed: roles.is_complete(),
            room: self.skip_summary(),
            state_hash: self.state_hash.clone(),
        }
    }
}

/// Build a roster entry; the id embeds the device and join time.
pub fn new_room_player(name: &str, device_id: &str, avatar: Option<String>) -> RoomPlayer {
    let joined_at = Utc::now();
    RoomPlayer {
        id: PlayerId::new(format!("{}_{}", device_id, joined_at.timestamp_millis())),
        name: name.trim().to_string(),
        device_id: device_id.to_string(),
        avatar_data_url: avatar,
        joined_at,
    }
}
