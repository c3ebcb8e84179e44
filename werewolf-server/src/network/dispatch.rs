//! Action Dispatch
//!
//! Maps a decoded request onto the registry. The HTTP endpoint, the
//! WebSocket channel and in-process clients all go through here.

use serde_json::Value;
use tracing::{debug, warn};

use crate::network::protocol::{
    success_body, Ack, ErrorCode, Failure, NightActionsReply, RoomAction, RoomReply,
    RoomRequest, SkipVoteReply, SubmitReply, UpdateReply,
};
use crate::network::registry::RoomRegistry;
use crate::network::room::RoomError;

/// Run one request against the registry.
pub async fn dispatch(registry: &RoomRegistry, request: RoomRequest) -> Result<RoomReply, RoomError> {
    debug!("Dispatch {} from device {}", request.action.name(), request.device_id);

    // Every action except create needs a valid code
    let code = request.room_code();
    let device = request.device_id.as_str();

    let reply = match request.action {
        RoomAction::Create { player_name, avatar_data_url } => {
            RoomReply::Seat(registry.create(&player_name, device, avatar_data_url).await?)
        }
        RoomAction::Join { player_name, avatar_data_url } => {
            RoomReply::Seat(registry.join(&code?, &player_name, device, avatar_data_url).await?)
        }
        RoomAction::GetState => {
            RoomReply::State(Box::new(registry.get_state(&code?).await?))
        }
        RoomAction::StartGame => {
            registry.start_game(&code?, device).await?;
            RoomReply::Ack(Ack {})
        }
        RoomAction::UpdateGameState { game_state } => {
            let version = registry.update_game_state(&code?, device, game_state).await?;
            RoomReply::Updated(UpdateReply { version })
        }
        RoomAction::MarkNightActionComplete => {
            RoomReply::Progress(registry.mark_night_action_complete(&code?, device).await?)
        }
        RoomAction::MarkRoleRevealed => {
            RoomReply::Progress(registry.mark_role_revealed(&code?, device).await?)
        }
        RoomAction::ResetPhaseTracking { tracking_type } => {
            registry.reset_phase_tracking(&code?, device, tracking_type).await?;
            RoomReply::Ack(Ack {})
        }
        RoomAction::SubmitNightAction { role, night_action, target_id } => {
            let actions_submitted = registry
                .submit_night_action(&code?, device, role, night_action, target_id)
                .await?;
            RoomReply::Submitted(SubmitReply { actions_submitted })
        }
        RoomAction::GetNightActions => {
            let night_actions = registry.get_night_actions(&code?).await?;
            RoomReply::NightActions(NightActionsReply { night_actions })
        }
        RoomAction::VoteSkip => {
            let (summary, game_state) = registry.vote_skip(&code?, device).await?;
            RoomReply::SkipVote(SkipVoteReply {
                skip_votes: summary.skip_votes,
                total: summary.total_alive_players,
                all_voted_skip: summary.all_voted_skip,
                game_state,
            })
        }
        RoomAction::Leave => {
            registry.leave(&code?, device).await?;
            RoomReply::Ack(Ack {})
        }
    };
    Ok(reply)
}

/// Decode a raw body, dispatch it, and encode the reply with its status.
pub async fn handle_value(registry: &RoomRegistry, body: Value) -> (u16, Value) {
    let result = match RoomRequest::from_value(body) {
        Ok(request) => dispatch(registry, request).await,
        Err(err) => Err(RoomError::from(err)),
    };

    match result {
        Ok(reply) => match success_body(&reply) {
            Ok(value) => (200, value),
            Err(e) => failure_value(&RoomError::Internal(e.to_string())),
        },
        Err(err) => {
            if err.code() == ErrorCode::Internal {
                warn!("Room request failed: {}", err);
            } else {
                debug!("Room request rejected: {}", err);
            }
            failure_value(&err)
        }
    }
}

fn failure_value(err: &RoomError) -> (u16, Value) {
    let failure = Failure::from(err);
    let status = failure.code.status();
    let value = serde_json::to_value(&failure).unwrap_or(Value::Null);
    (status, value)
}
