//! HTTP Surface
//!
//! - `POST /api/room`: registry action endpoint
//! - `GET  /api/room[?code=]`: debug summary
//! - `POST /api/host`: narrator
//! - `POST /api/tts`: text-to-speech with local fallback
//! - `GET  /health`

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Serialize, Deserialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::narrator::voice::SpeechRequest;
use crate::narrator::{NarratorChain, NarratorRequest, NarratorResponse, SpeechOutcome, SpeechService};
use crate::network::dispatch::handle_value;
use crate::network::protocol::{ErrorCode, Failure};
use crate::network::registry::{RoomRegistry, RoomSummary};
use crate::network::room::RoomError;
use crate::network::room_code::RoomCode;

/// Shared handler state.
pub struct AppState {
    /// Live rooms.
    pub registry: Arc<RoomRegistry>,
    /// Narrator providers.
    pub narrator: NarratorChain,
    /// Speech provider.
    pub speech: SpeechService,
}

/// All routes, without middleware.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/api/room", post(room_action).get(room_summary))
        .route("/api/host", post(host))
        .route("/api/tts", post(tts))
}

/// Routes with tracing and permissive CORS, bound to `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// ROOM
// =============================================================================

async fn room_action(State(app): State<Arc<AppState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return ApiError::BadRequest(format!("Invalid JSON: {}", e)).into_response(),
    };

    let (status, body) = handle_value(&app.registry, value).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomList {
    total_rooms: usize,
    rooms: Vec<RoomSummary>,
}

async fn room_summary(
    State(app): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, ApiError> {
    match query.code {
        None => {
            let rooms = app.registry.summaries().await;
            Ok(Json(RoomList { total_rooms: rooms.len(), rooms }).into_response())
        }
        Some(raw) => {
            let code = RoomCode::parse(&raw).ok_or(ApiError::Room(RoomError::NotFound))?;
            let summary = app.registry.summary(&code).await?;
            Ok(Json(summary).into_response())
        }
    }
}

// =============================================================================
// NARRATOR
// =============================================================================

async fn host(State(app): State<Arc<AppState>>, body: Bytes) -> Result<Json<NarratorResponse>, ApiError> {
    let request: NarratorRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("bad_request".to_string()))?;
    Ok(Json(app.narrator.ask(&request).await))
}

async fn tts(State(app): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let request: SpeechRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("bad_request".to_string()))?;
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("No text provided".to_string()));
    }

    let response = match app.speech.speak(&request).await {
        SpeechOutcome::Audio(audio) => {
            ([(header::CONTENT_TYPE, audio.content_type)], audio.bytes).into_response()
        }
        SpeechOutcome::Fallback { text, reason } => {
            Json(json!({ "fallback": true, "text": text, "error": reason })).into_response()
        }
    };
    Ok(response)
}

// =============================================================================
// ERRORS
// =============================================================================

/// Handler errors.
#[derive(Debug)]
pub enum ApiError {
    /// Registry failure.
    Room(RoomError),
    /// Undecodable body.
    BadRequest(String),
}

impl From<RoomError> for ApiError {
    fn from(e: RoomError) -> Self {
        ApiError::Room(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let failure = match self {
            ApiError::Room(e) => Failure::from(&e),
            ApiError::BadRequest(msg) => Failure::new(ErrorCode::Validation, msg),
        };
        let status = StatusCode::from_u16(failure.code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(failure)).into_response()
    }
}
