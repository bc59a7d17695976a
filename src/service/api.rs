//! HTTP write surface for lobbies and runtime configuration
//!
//! These routes are merged into the health server's router. Every handler
//! locks the shared engine, applies one operation and releases the lock; the
//! tick scheduler picks the change up on its next tick.

use crate::config::MatchmakingConfig;
use crate::error::MatchmakingError;
use crate::lobby::{Lobby, LobbyInstance};
use crate::matchmaking::Matchmaker;
use crate::metrics::health::HealthServerState;
use crate::service::scheduler::SharedMatchmaker;
use crate::types::{ClassId, LobbyId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

/// Errors returned by the lobby API
#[derive(Debug)]
pub enum ApiError {
    /// The health server was started without application state
    NotInitialized,
    /// An engine operation was rejected
    Engine(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Engine(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(err) => match err.downcast_ref::<MatchmakingError>() {
                Some(MatchmakingError::LobbyNotFound { .. })
                | Some(MatchmakingError::MemberNotFound { .. }) => StatusCode::NOT_FOUND,
                Some(MatchmakingError::LobbyFull { .. })
                | Some(MatchmakingError::DuplicateMember { .. })
                | Some(MatchmakingError::LobbyNotReady { .. }) => StatusCode::CONFLICT,
                Some(MatchmakingError::InvalidSlot { .. })
                | Some(MatchmakingError::ConfigurationError { .. }) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::NotInitialized => "Service not initialized".to_string(),
            ApiError::Engine(err) => err.to_string(),
        };
        if status.is_server_error() {
            warn!("Lobby API request failed: {}", message);
        } else {
            debug!("Lobby API request rejected ({}): {}", status, message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    pub class_id: ClassId,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub name: String,
    /// Mark the member ready on arrival
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetReadyRequest {
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetClassRequest {
    pub class_id: ClassId,
}

/// Partial config update; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct ConfigPatch {
    pub allow_class_mix: Option<bool>,
    pub ai_eligible_time_ms: Option<u64>,
    pub ai_ready_threshold_ms: Option<u64>,
    pub max_matches_per_tick: Option<usize>,
}

impl ConfigPatch {
    pub fn apply(&self, current: &MatchmakingConfig) -> MatchmakingConfig {
        MatchmakingConfig {
            allow_class_mix: self.allow_class_mix.unwrap_or(current.allow_class_mix),
            ai_eligible_time_ms: self.ai_eligible_time_ms.unwrap_or(current.ai_eligible_time_ms),
            ai_ready_threshold_ms: self
                .ai_ready_threshold_ms
                .unwrap_or(current.ai_ready_threshold_ms),
            max_matches_per_tick: self
                .max_matches_per_tick
                .unwrap_or(current.max_matches_per_tick),
        }
    }
}

/// Lobby and config routes, to be merged into the health server router
pub fn routes() -> Router<HealthServerState> {
    Router::new()
        .route("/lobbies", post(create_lobby_handler))
        .route(
            "/lobbies/{lobby_id}",
            get(get_lobby_handler).delete(delete_lobby_handler),
        )
        .route("/lobbies/{lobby_id}/class", put(set_class_handler))
        .route("/lobbies/{lobby_id}/members", post(add_member_handler))
        .route(
            "/lobbies/{lobby_id}/members/{slot}",
            delete(remove_member_handler),
        )
        .route(
            "/lobbies/{lobby_id}/members/{slot}/ready",
            put(set_ready_handler),
        )
        .route("/config", get(get_config_handler).put(update_config_handler))
}

fn engine_of(state: &HealthServerState) -> Result<SharedMatchmaker, ApiError> {
    state
        .app_state
        .as_ref()
        .map(|app_state| app_state.engine())
        .ok_or(ApiError::NotInitialized)
}

fn lobby_json(engine: &Matchmaker, lobby: &LobbyInstance) -> Value {
    let members: Vec<Value> = lobby
        .slots()
        .iter()
        .enumerate()
        .filter_map(|(slot, member)| {
            member.as_ref().map(|member| {
                json!({ "slot": slot, "name": member.name, "ready": member.ready })
            })
        })
        .collect();

    json!({
        "lobby_id": lobby.lobby_id(),
        "class_id": lobby.class_id(),
        "members": members,
        "all_ready": lobby.all_ready(),
        "queued": engine.is_queued(lobby.lobby_id()),
        "time_joined": lobby.time_joined(),
        "ai_eligible": lobby.ai_eligible(),
        "created_at": lobby.created_at()
    })
}

/// Current state of one lobby, or 404 once it is deleted or matched
fn lobby_state(engine: &Matchmaker, lobby_id: LobbyId) -> ApiResult {
    let lobby = engine
        .lobby(lobby_id)
        .ok_or(MatchmakingError::LobbyNotFound { lobby_id })
        .map_err(anyhow::Error::from)?;
    Ok((StatusCode::OK, Json(lobby_json(engine, lobby))))
}

async fn create_lobby_handler(
    State(state): State<HealthServerState>,
    Json(request): Json<CreateLobbyRequest>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    let lobby_id = engine.create_lobby(request.class_id);
    info!("Lobby {} created via API (class {})", lobby_id, request.class_id);

    let (_, body) = lobby_state(&engine, lobby_id)?;
    Ok((StatusCode::CREATED, body))
}

async fn get_lobby_handler(
    State(state): State<HealthServerState>,
    Path(lobby_id): Path<LobbyId>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let engine = engine.lock().await;
    lobby_state(&engine, lobby_id)
}

async fn delete_lobby_handler(
    State(state): State<HealthServerState>,
    Path(lobby_id): Path<LobbyId>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let lobby = engine.lock().await.delete_lobby(lobby_id)?;
    info!("Lobby {} deleted via API", lobby_id);
    Ok((
        StatusCode::OK,
        Json(json!({ "lobby_id": lobby_id, "members": lobby.member_names() })),
    ))
}

async fn set_class_handler(
    State(state): State<HealthServerState>,
    Path(lobby_id): Path<LobbyId>,
    Json(request): Json<SetClassRequest>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    engine.set_lobby_class(lobby_id, request.class_id)?;
    lobby_state(&engine, lobby_id)
}

async fn add_member_handler(
    State(state): State<HealthServerState>,
    Path(lobby_id): Path<LobbyId>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    let slot = engine.add_member(lobby_id, request.name)?;
    if request.ready {
        engine.set_member_ready(lobby_id, slot, true)?;
    }

    let (_, body) = lobby_state(&engine, lobby_id)?;
    Ok((StatusCode::CREATED, body))
}

async fn remove_member_handler(
    State(state): State<HealthServerState>,
    Path((lobby_id, slot)): Path<(LobbyId, usize)>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    engine.remove_member(lobby_id, slot)?;
    lobby_state(&engine, lobby_id)
}

async fn set_ready_handler(
    State(state): State<HealthServerState>,
    Path((lobby_id, slot)): Path<(LobbyId, usize)>,
    Json(request): Json<SetReadyRequest>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    engine.set_member_ready(lobby_id, slot, request.ready)?;
    lobby_state(&engine, lobby_id)
}

async fn get_config_handler(State(state): State<HealthServerState>) -> ApiResult {
    let engine = engine_of(&state)?;
    let config = engine.lock().await.config().clone();
    Ok((StatusCode::OK, Json(json!(config))))
}

async fn update_config_handler(
    State(state): State<HealthServerState>,
    Json(patch): Json<ConfigPatch>,
) -> ApiResult {
    let engine = engine_of(&state)?;
    let mut engine = engine.lock().await;
    let config = patch.apply(engine.config());
    engine.update_config(config)?;
    Ok((StatusCode::OK, Json(json!(engine.config()))))
}
