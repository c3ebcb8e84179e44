//! Typed room client.

use std::sync::Arc;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use werewolf::game::context::NarratorContext;
use werewolf::game::roles::RoleId;
use werewolf::game::state::{GameState, NightActions, PlayerId};
use werewolf::narrator::{NarratorRequest, NarratorResponse, FALLBACK_LINE};
use werewolf::network::protocol::{
    decode_envelope, Ack, NightActionsReply, RoomAction, RoomRequest, SkipVoteReply, SubmitReply,
    UpdateReply,
};
use werewolf::network::registry::Seat;
use werewolf::network::room::{NightActionKind, Progress, RoomStateView, TrackingType};
use werewolf::network::room_code::RoomCode;

use crate::transport::{RoomTransport, TransportError};

/// One device seated in one room.
#[derive(Clone)]
pub struct RoomClient {
    transport: Arc<dyn RoomTransport>,
    device_id: String,
    room_code: RoomCode,
    player_id: PlayerId,
}

impl RoomClient {
    /// Create a room; the caller becomes host.
    pub async fn create(
        transport: Arc<dyn RoomTransport>,
        device_id: impl Into<String>,
        player_name: &str,
        avatar_data_url: Option<String>,
    ) -> Result<(Self, Seat), TransportError> {
        let device_id = device_id.into();
        let action = RoomAction::Create {
            player_name: player_name.to_string(),
            avatar_data_url,
        };
        let request = RoomRequest::new(action, None, device_id.clone());
        let seat: Seat = send(transport.as_ref(), &request).await?;
        info!("Created room {} as {}", seat.room_code, seat.player_id);

        let client = Self {
            transport,
            device_id,
            room_code: seat.room_code.clone(),
            player_id: seat.player_id.clone(),
        };
        Ok((client, seat))
    }

    /// Join an existing room. Joining again from the same device returns
    /// the same seat.
    pub async fn join(
        transport: Arc<dyn RoomTransport>,
        device_id: impl Into<String>,
        room_code: &RoomCode,
        player_name: &str,
        avatar_data_url: Option<String>,
    ) -> Result<(Self, Seat), TransportError> {
        let device_id = device_id.into();
        let action = RoomAction::Join {
            player_name: player_name.to_string(),
            avatar_data_url,
        };
        let request = RoomRequest::new(action, Some(room_code), device_id.clone());
        let seat: Seat = send(transport.as_ref(), &request).await?;
        info!("Joined room {} as {}", seat.room_code, seat.player_id);

        let client = Self {
            transport,
            device_id,
            room_code: seat.room_code.clone(),
            player_id: seat.player_id.clone(),
        };
        Ok((client, seat))
    }

    /// Room code.
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// This device's id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// This device's player id.
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    async fn send<T: DeserializeOwned>(&self, action: RoomAction) -> Result<T, TransportError> {
        let request = RoomRequest::new(action, Some(&self.room_code), self.device_id.clone());
        send(self.transport.as_ref(), &request).await
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Full room view.
    pub async fn get_state(&self) -> Result<RoomStateView, TransportError> {
        self.send(RoomAction::GetState).await
    }

    /// Mark the room as playing. Host only.
    pub async fn start_game(&self) -> Result<(), TransportError> {
        self.send::<Ack>(RoomAction::StartGame).await.map(|_| ())
    }

    /// Push a snapshot. Host only. Returns the stored version.
    pub async fn update_game_state(&self, game_state: GameState) -> Result<u64, TransportError> {
        let reply: UpdateReply = self.send(RoomAction::UpdateGameState { game_state }).await?;
        Ok(reply.version)
    }

    /// Report this device's night actions as done.
    pub async fn mark_night_action_complete(&self) -> Result<Progress, TransportError> {
        self.send(RoomAction::MarkNightActionComplete).await
    }

    /// Report that this device has seen its role.
    pub async fn mark_role_revealed(&self) -> Result<Progress, TransportError> {
        self.send(RoomAction::MarkRoleRevealed).await
    }

    /// Clear one completion set. Host only.
    pub async fn reset_phase_tracking(&self, tracking_type: TrackingType) -> Result<(), TransportError> {
        self.send::<Ack>(RoomAction::ResetPhaseTracking { tracking_type }).await.map(|_| ())
    }

    /// Submit a night target. Returns how many devices have submitted.
    pub async fn submit_night_action(
        &self,
        role: Option<RoleId>,
        night_action: NightActionKind,
        target_id: Option<PlayerId>,
    ) -> Result<usize, TransportError> {
        let reply: SubmitReply = self
            .send(RoomAction::SubmitNightAction { role, night_action, target_id })
            .await?;
        Ok(reply.actions_submitted)
    }

    /// Aggregated night targets.
    pub async fn get_night_actions(&self) -> Result<NightActions, TransportError> {
        let reply: NightActionsReply = self.send(RoomAction::GetNightActions).await?;
        Ok(reply.night_actions)
    }

    /// Vote to skip the rest of the discussion.
    pub async fn vote_skip(&self) -> Result<SkipVoteReply, TransportError> {
        self.send(RoomAction::VoteSkip).await
    }

    /// Leave the room.
    pub async fn leave(&self) -> Result<(), TransportError> {
        self.send::<Ack>(RoomAction::Leave).await.map(|_| ())
    }

    /// Ask the narrator a free-form question.
    pub async fn ask_narrator(
        &self,
        question: &str,
        game_context: Option<NarratorContext>,
        provider_preference: Option<String>,
    ) -> Result<NarratorResponse, TransportError> {
        let request = NarratorRequest {
            question: question.to_string(),
            game_context,
            provider_preference,
        };
        self.narrate(&request).await
    }

    /// Ask the narrator; any failure yields the stock line so the table
    /// never waits on a provider.
    pub async fn narrator_line(&self, question: &str, game_context: Option<NarratorContext>) -> String {
        match self.ask_narrator(question, game_context, None).await {
            Ok(response) => response.answer,
            Err(e) => {
                warn!("Narrator unavailable: {}", e);
                FALLBACK_LINE.to_string()
            }
        }
    }

    /// Send a prepared narrator request.
    pub async fn narrate(&self, request: &NarratorRequest) -> Result<NarratorResponse, TransportError> {
        self.transport.narrate(request).await
    }
}

async fn send<T: DeserializeOwned>(
    transport: &dyn RoomTransport,
    request: &RoomRequest,
) -> Result<T, TransportError> {
    let value = transport.call(request).await?;
    decode_envelope::<T>(value)?.map_err(TransportError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use werewolf::network::protocol::ErrorCode;
    use werewolf::network::registry::RoomRegistry;
    use crate::transport::LocalTransport;

    fn transport() -> Arc<dyn RoomTransport> {
        Arc::new(LocalTransport::new(Arc::new(RoomRegistry::default())))
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let transport = transport();
        let (host, seat) = RoomClient::create(transport.clone(), "d1", "Alice", None).await.unwrap();
        assert!(seat.is_host);

        let (guest, guest_seat) = RoomClient::join(transport, "d2", host.room_code(), "Bob", None)
            .await
            .unwrap();
        assert!(!guest_seat.is_host);
        assert_eq!(guest_seat.players.len(), 2);

        let view = guest.get_state().await.unwrap();
        assert_eq!(&view.host_id, host.player_id());
        assert!(view.game_state.is_none());
    }

    #[tokio::test]
    async fn test_guest_cannot_start() {
        let transport = transport();
        let (host, _) = RoomClient::create(transport.clone(), "d1", "Alice", None).await.unwrap();
        let (guest, _) = RoomClient::join(transport, "d2", host.room_code(), "Bob", None)
            .await
            .unwrap();

        let err = guest.start_game().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Forbidden));
        host.start_game().await.unwrap();
    }

    #[tokio::test]
    async fn test_join_missing_room() {
        let code = RoomCode::parse("QQQQQQ").unwrap();
        let err = match RoomClient::join(transport(), "d1", &code, "Alice", None).await {
            Ok(_) => panic!("joined a missing room"),
            Err(err) => err,
        };
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_barriers_and_skip() {
        let transport = transport();
        let (host, _) = RoomClient::create(transport.clone(), "d1", "Alice", None).await.unwrap();
        let (guest, _) = RoomClient::join(transport, "d2", host.room_code(), "Bob", None)
            .await
            .unwrap();

        assert_eq!(host.mark_role_revealed().await.unwrap(), Progress { completed: 1, total: 2 });
        assert!(guest.mark_role_revealed().await.unwrap().is_complete());

        let skip = guest.vote_skip().await.unwrap();
        assert_eq!((skip.skip_votes, skip.total, skip.all_voted_skip), (1, 2, false));

        host.reset_phase_tracking(TrackingType::Roles).await.unwrap();
        assert_eq!(host.get_state().await.unwrap().roles_revealed, 0);
    }

    #[tokio::test]
    async fn test_narrator_through_client() {
        let (host, _) = RoomClient::create(transport(), "d1", "Alice", None).await.unwrap();
        let response = host.ask_narrator("explain the rules", None, None).await.unwrap();
        assert_eq!(response.provider, "mock");
        assert!(!response.answer.is_empty());
    }
}
