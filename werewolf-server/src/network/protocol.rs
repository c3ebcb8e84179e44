//! Protocol Messages
//!
//! Wire format shared by the HTTP action endpoint, the WebSocket channel
//! and the client crate. Requests are `{action, roomCode?, deviceId, ...}`;
//! replies are `{success: true, ...}` or `{success: false, error, code}`.

use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::game::roles::RoleId;
use crate::game::state::{GameState, NightActions, PlayerId};
use crate::network::registry::Seat;
use crate::network::room::{
    NightActionKind, Progress, RoomError, RoomEvent, RoomStateView, TrackingType,
};
use crate::network::room_code::RoomCode;

// =============================================================================
// ERRORS
// =============================================================================

/// Stable failure tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed request.
    Validation,
    /// Unknown room.
    NotFound,
    /// Host-only action from a non-host.
    Forbidden,
    /// Snapshot not newer than the stored one.
    StaleSnapshot,
    /// Server at capacity.
    Unavailable,
    /// Unexpected failure.
    Internal,
}

impl ErrorCode {
    /// HTTP status for this failure.
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::Validation => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Forbidden => 403,
            ErrorCode::StaleSnapshot => 409,
            ErrorCode::Unavailable => 503,
            ErrorCode::Internal => 500,
        }
    }
}

impl RoomError {
    /// Wire tag for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::Validation(_) => ErrorCode::Validation,
            RoomError::NotFound => ErrorCode::NotFound,
            RoomError::NotHost(_) => ErrorCode::Forbidden,
            RoomError::StaleSnapshot { .. } => ErrorCode::StaleSnapshot,
            RoomError::Capacity => ErrorCode::Unavailable,
            RoomError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Request decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No `action` field.
    #[error("Missing action")]
    MissingAction,

    /// `action` names nothing we handle.
    #[error("Unknown action")]
    UnknownAction(String),

    /// The action needs a room code.
    #[error("Missing roomCode")]
    MissingRoomCode,

    /// The room code is not six characters from `[A-Z0-9]`.
    #[error("Invalid room code: {0}")]
    InvalidRoomCode(String),

    /// Fields of a known action failed to decode.
    #[error("Invalid request: {0}")]
    InvalidFields(String),

    /// Body is not JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ProtocolError> for RoomError {
    fn from(err: ProtocolError) -> Self {
        RoomError::Validation(err.to_string())
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Every action name the registry accepts.
pub const ACTIONS: &[&str] = &[
    "create",
    "join",
    "get_state",
    "start_game",
    "update_game_state",
    "mark_night_action_complete",
    "mark_role_revealed",
    "reset_phase_tracking",
    "submit_night_action",
    "get_night_actions",
    "vote_skip",
    "leave",
];

/// One registry action and its specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RoomAction {
    /// Open a new room.
    Create {
        /// Display name.
        player_name: String,
        /// Avatar reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_data_url: Option<String>,
    },
    /// Take a seat, or get the existing one back.
    Join {
        /// Display name.
        player_name: String,
        /// Avatar reference.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_data_url: Option<String>,
    },
    /// Read the room.
    GetState,
    /// Host marks the room playing.
    StartGame,
    /// Host pushes a snapshot.
    UpdateGameState {
        /// The snapshot.
        game_state: GameState,
    },
    /// Night barrier acknowledgement.
    MarkNightActionComplete,
    /// Role reveal acknowledgement.
    MarkRoleRevealed,
    /// Host clears a completion set.
    ResetPhaseTracking {
        /// Which set.
        tracking_type: TrackingType,
    },
    /// Submit a night action.
    SubmitNightAction {
        /// Role the device acts as.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<RoleId>,
        /// Action type.
        night_action: NightActionKind,
        /// Target.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<PlayerId>,
    },
    /// Aggregated night targets.
    GetNightActions,
    /// Vote to skip free talk.
    VoteSkip,
    /// Leave the room.
    Leave,
}

impl RoomAction {
    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            RoomAction::Create { .. } => "create",
            RoomAction::Join { .. } => "join",
            RoomAction::GetState => "get_state",
            RoomAction::StartGame => "start_game",
            RoomAction::UpdateGameState { .. } => "update_game_state",
            RoomAction::MarkNightActionComplete => "mark_night_action_complete",
            RoomAction::MarkRoleRevealed => "mark_role_revealed",
            RoomAction::ResetPhaseTracking { .. } => "reset_phase_tracking",
            RoomAction::SubmitNightAction { .. } => "submit_night_action",
            RoomAction::GetNightActions => "get_night_actions",
            RoomAction::VoteSkip => "vote_skip",
            RoomAction::Leave => "leave",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestHeader {
    #[serde(default)]
    room_code: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
}

/// A full request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRequest {
    /// What to do.
    pub action: RoomAction,
    /// Target room, raw as sent.
    pub room_code: Option<String>,
    /// Calling device.
    pub device_id: String,
}

impl RoomRequest {
    /// Build a request.
    pub fn new(action: RoomAction, room_code: Option<&RoomCode>, device_id: impl Into<String>) -> Self {
        Self {
            action,
            room_code: room_code.map(|c| c.as_str().to_string()),
            device_id: device_id.into(),
        }
    }

    /// Decode a JSON body, telling apart a missing action, an unknown
    /// action and bad fields.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let name = match value.get("action").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ProtocolError::MissingAction),
        };
        if !ACTIONS.contains(&name.as_str()) {
            return Err(ProtocolError::UnknownAction(name));
        }

        let header: RequestHeader = serde_json::from_value(value.clone())
            .map_err(|e| ProtocolError::InvalidFields(e.to_string()))?;
        let action: RoomAction = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidFields(e.to_string()))?;

        Ok(Self {
            action,
            room_code: header.room_code,
            device_id: header.device_id.unwrap_or_default(),
        })
    }

    /// Decode from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(s)?)
    }

    /// Encode as a JSON object.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.action)?;
        if let Value::Object(map) = &mut value {
            if let Some(code) = &self.room_code {
                map.insert("roomCode".to_string(), Value::String(code.clone()));
            }
            map.insert("deviceId".to_string(), Value::String(self.device_id.clone()));
        }
        Ok(value)
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value()?)
    }

    /// Normalized room code.
    pub fn room_code(&self) -> Result<RoomCode, ProtocolError> {
        let raw = self.room_code.as_deref().ok_or(ProtocolError::MissingRoomCode)?;
        RoomCode::parse(raw).ok_or_else(|| ProtocolError::InvalidRoomCode(raw.to_string()))
    }
}

// =============================================================================
// REPLIES
// =============================================================================

/// Empty success body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

/// `update_game_state` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReply {
    /// Stored version.
    pub version: u64,
}

/// `submit_night_action` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReply {
    /// Submissions so far this night.
    pub actions_submitted: usize,
}

/// `get_night_actions` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightActionsReply {
    /// Aggregated targets.
    pub night_actions: NightActions,
}

/// `vote_skip` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipVoteReply {
    /// Devices that voted.
    pub skip_votes: usize,
    /// Alive players counted.
    pub total: usize,
    /// Everyone alive voted.
    pub all_voted_skip: bool,
    /// Current snapshot.
    pub game_state: Option<GameState>,
}

/// Successful reply bodies; each serializes as a flat object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoomReply {
    /// `create`, `join`.
    Seat(Seat),
    /// `get_state`.
    State(Box<RoomStateView>),
    /// `start_game`, `reset_phase_tracking`, `leave`.
    Ack(Ack),
    /// `update_game_state`.
    Updated(UpdateReply),
    /// `mark_night_action_complete`, `mark_role_revealed`.
    Progress(Progress),
    /// `submit_night_action`.
    Submitted(SubmitReply),
    /// `get_night_actions`.
    NightActions(NightActionsReply),
    /// `vote_skip`.
    SkipVote(SkipVoteReply),
}

/// Failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Always false.
    pub success: bool,
    /// Human-readable message.
    pub error: String,
    /// Stable tag.
    pub code: ErrorCode,
}

impl Failure {
    /// Build a failure body.
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self { success: false, error: error.into(), code }
    }
}

impl From<&RoomError> for Failure {
    fn from(err: &RoomError) -> Self {
        Failure::new(err.code(), err.to_string())
    }
}

/// Wrap a success body as `{success: true, ...body}`.
pub fn success_body<T: Serialize>(body: &T) -> Result<Value, serde_json::Error> {
    let mut map = match serde_json::to_value(body)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("success".to_string(), Value::Bool(true));
    Ok(Value::Object(map))
}

/// Split an envelope into a typed success body or the failure.
pub fn decode_envelope<T: DeserializeOwned>(value: Value) -> Result<Result<T, Failure>, serde_json::Error> {
    let success = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    if success {
        serde_json::from_value(value).map(Ok)
    } else {
        serde_json::from_value(value).map(Err)
    }
}

// =============================================================================
// WEBSOCKET MESSAGES
// =============================================================================

/// Messages sent from client to server over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// A registry action; `request` is the same body as the HTTP endpoint.
    Request {
        /// Correlation id echoed in the response.
        id: u64,
        /// Action envelope.
        request: Value,
    },
    /// Receive notifications for a room.
    Subscribe {
        /// Room to follow.
        room_code: String,
    },
    /// Stop receiving notifications.
    Unsubscribe,
    /// Latency probe.
    Ping {
        /// Client timestamp.
        timestamp: u64,
    },
}

/// Messages sent from server to client over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to a `Request`.
    Response {
        /// Correlation id.
        id: u64,
        /// HTTP-equivalent status.
        status: u16,
        /// Reply envelope.
        body: Value,
    },
    /// Subscription confirmed.
    Subscribed {
        /// Room followed.
        room_code: RoomCode,
    },
    /// Room notification.
    Event {
        /// Source room.
        room_code: RoomCode,
        /// What happened.
        event: RoomEvent,
    },
    /// Ping reply.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time in ms.
        server_time: u64,
    },
    /// Channel-level failure.
    Error {
        /// Stable tag.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },
    /// Server is going away.
    Shutdown,
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_unknown_action() {
        let err = RoomRequest::from_value(json!({"deviceId": "d1"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAction));
        assert_eq!(err.to_string(), "Missing action");

        let err = RoomRequest::from_value(json!({"action": "fly", "deviceId": "d1"})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(ref a) if a == "fly"));
        assert_eq!(err.to_string(), "Unknown action");
    }

    #[test]
    fn test_parse_join() {
        let req = RoomRequest::from_value(json!({
            "action": "join",
            "roomCode": "abc123",
            "deviceId": "d2",
            "playerName": "Bob",
        })).unwrap();

        assert_eq!(req.device_id, "d2");
        assert_eq!(req.room_code().unwrap().as_str(), "ABC123");
        assert_eq!(req.action, RoomAction::Join { player_name: "Bob".into(), avatar_data_url: None });
    }

    #[test]
    fn test_parse_submit_night_action() {
        let req = RoomRequest::from_value(json!({
            "action": "submit_night_action",
            "roomCode": "ABC123",
            "deviceId": "d1",
            "role": "werewolf",
            "nightAction": "kill",
            "targetId": "p3",
        })).unwrap();

        assert_eq!(req.action, RoomAction::SubmitNightAction {
            role: Some(RoleId::Werewolf),
            night_action: NightActionKind::Kill,
            target_id: Some(PlayerId::from("p3")),
        });
    }

    #[test]
    fn test_bad_fields_are_validation() {
        let err = RoomRequest::from_value(json!({
            "action": "reset_phase_tracking",
            "roomCode": "ABC123",
            "deviceId": "d1",
            "trackingType": "daytime",
        })).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFields(_)));
        assert_eq!(RoomError::from(err).code(), ErrorCode::Validation);
    }

    #[test]
    fn test_room_code_errors() {
        let req = RoomRequest::from_value(json!({"action": "get_state", "deviceId": "d1"})).unwrap();
        assert!(matches!(req.room_code(), Err(ProtocolError::MissingRoomCode)));

        let req = RoomRequest::from_value(json!({"action": "get_state", "roomCode": "A!", "deviceId": "d1"})).unwrap();
        assert!(matches!(req.room_code(), Err(ProtocolError::InvalidRoomCode(_))));
    }

    #[test]
    fn test_request_encoding_matches_wire() {
        let code = RoomCode::parse("ABC123").unwrap();
        let req = RoomRequest::new(
            RoomAction::ResetPhaseTracking { tracking_type: TrackingType::Night },
            Some(&code),
            "d1",
        );
        let value = req.to_value().unwrap();
        assert_eq!(value, json!({
            "action": "reset_phase_tracking",
            "trackingType": "night",
            "roomCode": "ABC123",
            "deviceId": "d1",
        }));
        assert_eq!(RoomRequest::from_value(value).unwrap(), req);
    }

    #[test]
    fn test_envelopes() {
        let body = success_body(&RoomReply::Submitted(SubmitReply { actions_submitted: 2 })).unwrap();
        assert_eq!(body, json!({"success": true, "actionsSubmitted": 2}));
        let decoded: SubmitReply = decode_envelope(body).unwrap().unwrap();
        assert_eq!(decoded.actions_submitted, 2);

        let ack = success_body(&RoomReply::Ack(Ack {})).unwrap();
        assert_eq!(ack, json!({"success": true}));

        let failure = serde_json::to_value(Failure::from(&RoomError::NotFound)).unwrap();
        assert_eq!(failure, json!({"success": false, "error": "Room not found", "code": "not_found"}));
        let decoded = decode_envelope::<Ack>(failure).unwrap();
        assert_eq!(decoded.unwrap_err().code, ErrorCode::NotFound);
    }

    #[test]
    fn test_error_status() {
        assert_eq!(RoomError::NotHost("x").code().status(), 403);
        assert_eq!(RoomError::StaleSnapshot { offered: 1, current: 2 }.code().status(), 409);
        assert_eq!(RoomError::Capacity.code().status(), 503);
        assert_eq!(ErrorCode::Validation.status(), 400);
    }

    #[test]
    fn test_ws_messages() {
        let msg = ClientMessage::from_json(r#"{"type":"subscribe","roomCode":"abc123"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { ref room_code } if room_code == "abc123"));

        let event = ServerMessage::Event {
            room_code: RoomCode::parse("ABC123").unwrap(),
            event: RoomEvent::Snapshot { version: 4, phase: "NightStart".into() },
        };
        let json = event.to_json().unwrap();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains(r#""event":"snapshot""#));
        assert!(matches!(ServerMessage::from_json(&json).unwrap(), ServerMessage::Event { .. }));
    }
}
