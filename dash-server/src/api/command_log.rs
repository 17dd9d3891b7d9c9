//! Per-guild command log: pushed by the bot, read by the dashboard.

use crate::auth::{ingest_authorized, CurrentSession};
use crate::errors::ApiError;
use crate::kv::KvClient;
use crate::openapi::INGEST_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

const READ_LEN: i64 = 50;
const KEEP_LEN: i64 = 200;

fn log_key(guild_id: &str) -> String {
    format!("cmdlog:{guild_id}")
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    guild_id: Option<String>,
}

/// Recent command invocations for a guild. Malformed stored entries are
/// skipped rather than failing the whole read.
#[utoipa::path(
    get,
    path = "/api/command-log",
    tag = INGEST_TAG,
    params(("guild_id" = String, Query, description = "Guild whose log to read")),
    responses(
        (status = 200, description = "Most recent entries, newest first"),
        (status = 400, description = "Missing guild_id"),
        (status = 401, description = "No valid session")
    )
)]
async fn get_log(
    State(state): State<AppState>,
    CurrentSession(_session): CurrentSession,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    let guild_id = query
        .guild_id
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_guild_id"))?;

    let kv = KvClient::from_state(&state);
    let raw = kv.lrange(&log_key(guild_id), 0, READ_LEN - 1).await?;
    let items: Vec<Value> = raw
        .iter()
        .filter_map(|entry| serde_json::from_str(entry).ok())
        .collect();

    Ok(Json(serde_json::json!({ "ok": true, "items": items })))
}

/// Bot push of one command invocation. Field aliases from older bot
/// versions are accepted and normalized.
#[derive(Debug, Deserialize, ToSchema)]
struct LogPush {
    guild_id: Option<String>,
    ts: Option<String>,
    user_name: Option<String>,
    user_id: Option<String>,
    cmd_name: Option<String>,
    name: Option<String>,
    channel_name: Option<String>,
    channel_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/command-log",
    tag = INGEST_TAG,
    responses(
        (status = 200, description = "Entry stored"),
        (status = 400, description = "Missing guild_id"),
        (status = 401, description = "Ingest token missing or wrong")
    )
)]
async fn push_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(entry): Json<LogPush>,
) -> Result<Json<Value>, ApiError> {
    if !ingest_authorized(&headers, &state.config.ingest) {
        return Err(ApiError::unauthorized("unauthorized"));
    }

    let guild_id = entry
        .guild_id
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_guild_id"))?;

    let item = serde_json::json!({
        "ts": entry.ts.unwrap_or_else(|| Utc::now().to_rfc3339()),
        "user": entry
            .user_name
            .or(entry.user_id)
            .unwrap_or_else(|| "unknown".to_string()),
        "cmd": entry
            .cmd_name
            .or(entry.name)
            .unwrap_or_else(|| "unknown".to_string()),
        "channel": entry.channel_name.or(entry.channel_id).unwrap_or_default(),
    });

    let key = log_key(guild_id);
    let kv = KvClient::from_state(&state);
    kv.lpush(&key, &item.to_string()).await?;
    kv.ltrim(&key, 0, KEEP_LEN - 1).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/command-log", get(get_log))
        .route("/command-log", post(push_log))
}
