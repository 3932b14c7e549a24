use std::collections::HashSet;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use giftbot_common::models::{GiftCodeRecord, GiftCodeTask, NotificationRecord, PlayerProfile};
use giftbot_core::services::RedeemResult;
use giftbot_core::Error;
use super::response::{ok, ApiError, ApiResult};
use super::ApiState;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub fid: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTaskRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
    #[serde(default)]
    pub fids: Option<Vec<String>>,
}

/// `?limit=`; anything missing, unparsable or non-positive means the default.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

impl LimitQuery {
    pub fn resolve(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FidQuery {
    #[serde(default)]
    pub fid: String,
}

fn require_numeric_fid(raw: &str) -> Result<String, ApiError> {
    let fid = raw.trim();
    if fid.is_empty() {
        return Err(ApiError::validation("fid is required"));
    }
    if fid.parse::<i64>().is_err() {
        return Err(ApiError::validation("fid must be a valid integer"));
    }
    Ok(fid.to_string())
}

pub async fn health(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    state.db.ping().await.map_err(|e| {
        error!("Health check failed: {}", e);
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "DATABASE_ERROR", "database unavailable")
    })?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let auth = state.auth.as_ref().ok_or_else(ApiError::internal)?;
    let (token, expires_at) = auth.login(req.username.trim(), &req.password)?;
    info!("Admin '{}' logged in", req.username.trim());
    Ok(ok(LoginResponse { token, expires_at }))
}

pub async fn list_users(State(state): State<ApiState>) -> ApiResult<Value> {
    let users: Vec<PlayerProfile> = state.players.list_players().await?;
    Ok(ok(json!({ "users": users })))
}

pub async fn add_user(
    State(state): State<ApiState>,
    Json(req): Json<AddUserRequest>,
) -> ApiResult<PlayerProfile> {
    let fid = require_numeric_fid(&req.fid)?;
    let profile = state.engine.register_player(&fid).await?;
    info!("Registered player {} ({})", profile.player_id, profile.nickname);
    Ok(ok(profile))
}

pub async fn user_codes(
    State(state): State<ApiState>,
    Path(fid): Path<String>,
) -> ApiResult<Value> {
    let records: Vec<GiftCodeRecord> = state.gift_codes.list_gift_codes_by_player(fid.trim()).await?;
    Ok(ok(json!({ "records": records })))
}

pub async fn list_tasks(State(state): State<ApiState>) -> ApiResult<Value> {
    let tasks: Vec<GiftCodeTask> = state.tasks.list_pending_tasks().await?;
    Ok(ok(json!({ "tasks": tasks })))
}

pub async fn add_task(
    State(state): State<ApiState>,
    Json(req): Json<AddTaskRequest>,
) -> ApiResult<GiftCodeTask> {
    let code = req.code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("gift code cannot be empty or whitespace only"));
    }
    if !state.tasks.create_task(code).await? {
        return Err(Error::AlreadyExists(format!("task for code '{}' already exists", code)).into());
    }
    info!("Task created for code '{}'", code);
    Ok(ok(state.tasks.get_task_by_code(code).await?))
}

pub async fn completed_tasks(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Value> {
    let tasks = state.tasks.list_completed_tasks(query.resolve()).await?;
    Ok(ok(json!({ "tasks": tasks })))
}

pub async fn delete_task(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> ApiResult<Value> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("invalid task code"));
    }
    state.tasks.delete_task(code).await?;
    info!("Task '{}' deleted", code);
    Ok(ok(json!({ "code": code, "deleted": true })))
}

pub async fn list_notifications(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Value> {
    let notifications: Vec<NotificationRecord> =
        state.notifications.list_notifications(query.resolve()).await?;
    Ok(ok(json!({ "notifications": notifications })))
}

/// Ad-hoc batch redemption. Without `fids` every registered player is used.
pub async fn redeem(
    State(state): State<ApiState>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<Vec<RedeemResult>> {
    let code = req.code.trim().to_string();
    if code.is_empty() {
        return Err(ApiError::validation("gift code must not be empty"));
    }

    let mut fids: Vec<String> = match req.fids {
        Some(list) if !list.is_empty() => list
            .iter()
            .map(|f| require_numeric_fid(f))
            .collect::<Result<_, _>>()?,
        _ => state.players.list_known_player_ids().await?,
    };
    let mut seen = HashSet::new();
    fids.retain(|fid| seen.insert(fid.clone()));

    info!("Batch redeem of '{}' for {} player(s)", code, fids.len());
    let results = state
        .engine
        .batch_redeem(&code, &fids, state.batch_concurrency)
        .await
        .map_err(|e| match e {
            Error::Validation(_) => ApiError::from(e),
            other => {
                error!("Batch redeem of '{}' failed: {}", code, other);
                ApiError::internal()
            }
        })?;
    Ok(ok(results))
}

pub async fn legacy_add_gift_code(
    State(state): State<ApiState>,
    Query(query): Query<CodeQuery>,
) -> ApiResult<Value> {
    let code = query.code.trim();
    if code.is_empty() {
        return Err(ApiError::validation("code is required"));
    }
    let created = state.tasks.create_task(code).await?;
    info!("Legacy gift code '{}' submitted (new: {})", code, created);
    Ok(ok(json!({
        "message": "Gift code task added successfully",
        "code": code,
        "created": created,
    })))
}

pub async fn legacy_add_user(
    State(state): State<ApiState>,
    Query(query): Query<FidQuery>,
) -> ApiResult<Value> {
    let fid = require_numeric_fid(&query.fid)?;
    state.engine.register_player(&fid).await?;
    Ok(ok(json!({ "message": "User added successfully", "fid": fid })))
}
