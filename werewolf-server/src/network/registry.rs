//! Room Registry
//!
//! In-memory store of live rooms. The map lock is only held to look up,
//! insert or remove a room; each room has its own lock so calls against
//! different rooms never wait on each other. Lock order: map, then room.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use rand::thread_rng;
use serde::{Serialize, Deserialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::game::roles::RoleId;
use crate::game::state::{GameState, NightActions, PlayerId};
use crate::network::room::{
    new_room_player, LeaveOutcome, NightActionKind, Progress, Room, RoomError,
    RoomEvent, RoomPlayer, RoomStateView, SkipVoteSummary, TrackingType,
};
use crate::network::room_code::RoomCode;

/// Shared handle to one room.
pub type RoomHandle = Arc<RwLock<Room>>;

/// Result of `create` and `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    /// Room code.
    pub room_code: RoomCode,
    /// The caller's player id.
    pub player_id: PlayerId,
    /// Whether the caller is host.
    pub is_host: bool,
    /// Roster in join order.
    pub players: Vec<RoomPlayer>,
}

/// Debug view of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room code.
    pub code: RoomCode,
    /// Roster size.
    pub players: usize,
    /// Whether a snapshot was pushed.
    pub has_game_state: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Registry of live rooms.
pub struct RoomRegistry {
    rooms: RwLock<BTreeMap<RoomCode, RoomHandle>>,
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Registry limits.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        let rooms = self.rooms.read().await;
        rooms.get(code).cloned().ok_or(RoomError::NotFound)
    }

    /// Look up a room, touch it, and run `f` under its write lock.
    async fn with_room<T>(
        &self,
        code: &RoomCode,
        f: impl FnOnce(&mut Room) -> Result<T, RoomError>,
    ) -> Result<T, RoomError> {
        let handle = self.room(code).await?;
        let mut room = handle.write().await;
        room.touch();
        f(&mut room)
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    /// Create a room with the caller as host.
    pub async fn create(
        &self,
        player_name: &str,
        device_id: &str,
        avatar: Option<String>,
    ) -> Result<Seat, RoomError> {
        validate_device(device_id)?;
        validate_name(player_name)?;

        let mut rooms = self.rooms.write().await;
        if rooms.len() >= self.config.max_rooms {
            return Err(RoomError::Capacity);
        }

        let code = loop {
            let candidate = RoomCode::generate(&mut thread_rng());
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let host = new_room_player(player_name, device_id, avatar);
        let seat = Seat {
            room_code: code.clone(),
            player_id: host.id.clone(),
            is_host: true,
            players: vec![host.clone()],
        };
        rooms.insert(code.clone(), Arc::new(RwLock::new(Room::new(code.clone(), host))));

        info!("Room {} created by device {}", code, device_id);
        Ok(seat)
    }

    /// Join a room, or return the device's existing seat.
    pub async fn join(
        &self,
        code: &RoomCode,
        player_name: &str,
        device_id: &str,
        avatar: Option<String>,
    ) -> Result<Seat, RoomError> {
        validate_device(device_id)?;
        validate_name(player_name)?;

        self.with_room(code, |room| {
            let (player, created) = room.join(player_name, device_id, avatar);
            if created {
                info!("Device {} joined room {} as {}", device_id, code, player.name);
            } else {
                debug!("Device {} rejoined room {}", device_id, code);
            }
            Ok(Seat {
                room_code: code.clone(),
                is_host: &player.id == room.host_id(),
                player_id: player.id,
                players: room.players().to_vec(),
            })
        }).await
    }

    /// Leave a room. An empty room is deleted; leaving a missing room is
    /// not an error.
    pub async fn leave(&self, code: &RoomCode, device_id: &str) -> Result<LeaveOutcome, RoomError> {
        validate_device(device_id)?;

        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(code).cloned() else {
            return Ok(LeaveOutcome { removed: false, new_host: None, empty: true });
        };

        let outcome = {
            let mut room = handle.write().await;
            room.touch();
            room.leave(device_id)
        };

        if let Some(host) = &outcome.new_host {
            info!("Host of room {} passed to {}", code, host);
        }
        if outcome.empty {
            rooms.remove(code);
            info!("Room {} deleted (empty)", code);
        }
        Ok(outcome)
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Full room view.
    pub async fn get_state(&self, code: &RoomCode) -> Result<RoomStateView, RoomError> {
        self.with_room(code, |room| Ok(room.state_view())).await
    }

    /// Host marks the room as playing.
    pub async fn start_game(&self, code: &RoomCode, device_id: &str) -> Result<(), RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| {
            room.start_game(device_id)?;
            info!("Room {} started", code);
            Ok(())
        }).await
    }

    /// Host pushes a snapshot. Returns the stored version.
    pub async fn update_game_state(
        &self,
        code: &RoomCode,
        device_id: &str,
        snapshot: GameState,
    ) -> Result<u64, RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| {
            let version = room.update_game_state(device_id, snapshot)?;
            if let Some(hash) = room.state_view().state_hash {
                debug!("Room {} snapshot v{} ({})", code, version, hash);
            }
            Ok(version)
        }).await
    }

    // =========================================================================
    // BARRIERS
    // =========================================================================

    /// Mark the device's night actions complete.
    pub async fn mark_night_action_complete(&self, code: &RoomCode, device_id: &str) -> Result<Progress, RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| Ok(room.mark_night_action_complete(device_id))).await
    }

    /// Mark the device's role as revealed.
    pub async fn mark_role_revealed(&self, code: &RoomCode, device_id: &str) -> Result<Progress, RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| Ok(room.mark_role_revealed(device_id))).await
    }

    /// Host clears one completion set.
    pub async fn reset_phase_tracking(
        &self,
        code: &RoomCode,
        device_id: &str,
        tracking: TrackingType,
    ) -> Result<(), RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| room.reset_tracking(device_id, tracking)).await
    }

    /// Store the device's night action. Returns the number of submissions.
    pub async fn submit_night_action(
        &self,
        code: &RoomCode,
        device_id: &str,
        role: Option<RoleId>,
        action: NightActionKind,
        target_id: Option<PlayerId>,
    ) -> Result<usize, RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| Ok(room.submit_night_action(device_id, role, action, target_id))).await
    }

    /// Aggregated night targets.
    pub async fn get_night_actions(&self, code: &RoomCode) -> Result<NightActions, RoomError> {
        self.with_room(code, |room| Ok(room.aggregate_night_actions())).await
    }

    /// Record a skip vote. Also returns the snapshot so the caller can
    /// sync without another round-trip.
    pub async fn vote_skip(
        &self,
        code: &RoomCode,
        device_id: &str,
    ) -> Result<(SkipVoteSummary, Option<GameState>), RoomError> {
        validate_device(device_id)?;
        self.with_room(code, |room| {
            let summary = room.vote_skip(device_id);
            Ok((summary, room.game_state().cloned()))
        }).await
    }

    // =========================================================================
    // HOUSEKEEPING
    // =========================================================================

    /// Subscribe to a room's notifications.
    pub async fn subscribe(&self, code: &RoomCode) -> Result<broadcast::Receiver<RoomEvent>, RoomError> {
        let handle = self.room(code).await?;
        let room = handle.read().await;
        Ok(room.subscribe())
    }

    /// Delete rooms idle longer than the configured timeout as of `now`.
    pub async fn sweep_idle(&self, now: Instant) -> Vec<RoomCode> {
        let mut rooms = self.rooms.write().await;
        let mut to_remove = Vec::new();

        for (code, room) in rooms.iter() {
            let r = room.read().await;
            if r.is_idle(now, self.config.idle_timeout) {
                to_remove.push(code.clone());
            }
        }

        for code in &to_remove {
            if let Some(room) = rooms.remove(code) {
                room.read().await.close();
            }
        }
        if !to_remove.is_empty() {
            info!("Swept {} idle rooms", to_remove.len());
        }
        to_remove
    }

    /// Live room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Debug view of one room. Does not count as activity.
    pub async fn summary(&self, code: &RoomCode) -> Result<RoomSummary, RoomError> {
        let handle = self.room(code).await?;
        let room = handle.read().await;
        Ok(summarize(&room))
    }

    /// Debug view of every room.
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms.values() {
            out.push(summarize(&*room.read().await));
        }
        out
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

fn summarize(room: &Room) -> RoomSummary {
    RoomSummary {
        code: room.code.clone(),
        players: room.players().len(),
        has_game_state: room.game_state().is_some(),
        created_at: room.created_at,
    }
}

fn validate_device(device_id: &str) -> Result<(), RoomError> {
    if device_id.trim().is_empty() {
        return Err(RoomError::Validation("Missing deviceId".to_string()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), RoomError> {
    if name.trim().is_empty() {
        return Err(RoomError::Validation("Missing playerName".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_and_join() {
        let registry = RoomRegistry::default();
        let alice = registry.create("Alice", "d1", None).await.unwrap();
        assert_eq!(alice.room_code.as_str().len(), 6);
        assert!(alice.is_host);
        assert_eq!(alice.players.len(), 1);

        let bob = registry.join(&alice.room_code, "Bob", "d2", None).await.unwrap();
        assert!(!bob.is_host);
        assert_eq!(bob.players.len(), 2);
        assert_ne!(bob.player_id, alice.player_id);

        let again = registry.join(&alice.room_code, "Bob", "d2", None).await.unwrap();
        assert_eq!(again.player_id, bob.player_id);
        assert_eq!(again.players.len(), 2);
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let registry = RoomRegistry::default();
        let code = RoomCode::parse("ZZZZZZ").unwrap();
        assert_eq!(registry.join(&code, "Bob", "d2", None).await, Err(RoomError::NotFound));
        assert_eq!(registry.get_state(&code).await.unwrap_err(), RoomError::NotFound);
    }

    #[tokio::test]
    async fn test_validation() {
        let registry = RoomRegistry::default();
        assert!(matches!(registry.create("", "d1", None).await, Err(RoomError::Validation(_))));
        assert!(matches!(registry.create("Alice", " ", None).await, Err(RoomError::Validation(_))));
    }

    #[tokio::test]
    async fn test_capacity() {
        let registry = RoomRegistry::new(RegistryConfig { max_rooms: 1, ..RegistryConfig::default() });
        registry.create("Alice", "d1", None).await.unwrap();
        assert_eq!(registry.create("Bob", "d2", None).await, Err(RoomError::Capacity));
    }

    #[tokio::test]
    async fn test_host_leaving_transfers_then_deletes() {
        let registry = RoomRegistry::default();
        let alice = registry.create("Alice", "d1", None).await.unwrap();
        let code = alice.room_code.clone();
        let bob = registry.join(&code, "Bob", "d2", None).await.unwrap();

        let outcome = registry.leave(&code, "d1").await.unwrap();
        assert_eq!(outcome.new_host, Some(bob.player_id.clone()));
        assert_eq!(registry.get_state(&code).await.unwrap().host_id, bob.player_id);

        let outcome = registry.leave(&code, "d2").await.unwrap();
        assert!(outcome.empty);
        assert_eq!(registry.room_count().await, 0);

        // Idempotent on a deleted room
        assert!(registry.leave(&code, "d2").await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_write_path() {
        let registry = RoomRegistry::default();
        let alice = registry.create("Alice", "d1", None).await.unwrap();
        let code = alice.room_code.clone();
        registry.join(&code, "Bob", "d2", None).await.unwrap();

        let mut state = GameState::new("g1", 7);
        state.version = 2;
        assert_eq!(
            registry.update_game_state(&code, "d2", state.clone()).await,
            Err(RoomError::NotHost("update the game state"))
        );
        assert_eq!(registry.update_game_state(&code, "d1", state.clone()).await, Ok(2));

        let view = registry.get_state(&code).await.unwrap();
        assert_eq!(view.game_state.map(|s| s.version), Some(2));
        assert_eq!(view.game_phase, crate::network::room::RoomPhase::Playing);

        assert!(matches!(
            registry.update_game_state(&code, "d1", state).await,
            Err(RoomError::StaleSnapshot { .. })
        ));
    }

    #[tokio::test]
    async fn test_night_actions_roundtrip() {
        let registry = RoomRegistry::default();
        let code = registry.create("Alice", "d1", None).await.unwrap().room_code;
        registry.join(&code, "Bob", "d2", None).await.unwrap();

        let n = registry.submit_night_action(&code, "d2", Some(RoleId::Werewolf), NightActionKind::Kill, Some(PlayerId::from("p1"))).await.unwrap();
        assert_eq!(n, 1);
        let actions = registry.get_night_actions(&code).await.unwrap();
        assert_eq!(actions.kill_target_id, Some(PlayerId::from("p1")));

        registry.reset_phase_tracking(&code, "d1", TrackingType::Night).await.unwrap();
        assert_eq!(registry.get_night_actions(&code).await.unwrap(), NightActions::default());
    }

    #[tokio::test]
    async fn test_sweep_idle() {
        let registry = RoomRegistry::new(RegistryConfig {
            idle_timeout: Duration::from_secs(60),
            ..RegistryConfig::default()
        });
        let code = registry.create("Alice", "d1", None).await.unwrap().room_code;
        let mut rx = registry.subscribe(&code).await.unwrap();

        assert!(registry.sweep_idle(Instant::now()).await.is_empty());
        let swept = registry.sweep_idle(Instant::now() + Duration::from_secs(120)).await;
        assert_eq!(swept, vec![code]);
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(rx.recv().await.unwrap(), RoomEvent::Closed);
    }

    #[tokio::test]
    async fn test_summaries() {
        let registry = RoomRegistry::default();
        let code = registry.create("Alice", "d1", None).await.unwrap().room_code;
        let summary = registry.summary(&code).await.unwrap();
        assert_eq!(summary.players, 1);
        assert!(!summary.has_game_state);
        assert_eq!(registry.summaries().await.len(), 1);
    }
}
