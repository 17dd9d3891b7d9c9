//! Guild listing and structure endpoints.

use crate::auth::CurrentSession;
use crate::discord::{self, DiscordClient};
use crate::errors::ApiError;
use crate::openapi::GUILD_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use dash_core::{snapshot_allows, MANAGE_ANY};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One guild of the caller's, annotated with whether the dashboard lets
/// them manage it
#[derive(Debug, Serialize, ToSchema)]
pub struct GuildSummary {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    #[serde(rename = "canManage")]
    pub can_manage: bool,
}

fn upstream_credential(session: &dash_core::SessionPayload) -> Result<&str, ApiError> {
    session
        .upstream_credential
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("expired_session"))
}

/// List the caller's guilds with management flags.
#[utoipa::path(
    get,
    path = "/api/guilds",
    tag = GUILD_TAG,
    responses(
        (status = 200, description = "The caller's guilds", body = [GuildSummary]),
        (status = 401, description = "No session or expired upstream credential"),
        (status = 502, description = "Upstream guild listing failed")
    )
)]
async fn list_guilds(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let credential = upstream_credential(&session)?;

    let discord = DiscordClient::from_state(&state);
    let member_guilds = discord.fetch_member_guilds(credential).await.map_err(|e| {
        if e.is_auth_rejection() {
            ApiError::unauthorized("expired_session")
        } else {
            warn!("Guild listing failed: {e}");
            ApiError::bad_gateway("discord_guilds_failed")
        }
    })?;

    let cdn = &state.config.discord.cdn;
    let guilds: Vec<GuildSummary> = member_guilds
        .into_iter()
        .map(|g| GuildSummary {
            icon: discord::icon_url(cdn, "icons", &g.id, g.icon.as_deref())
                .map(|url| format!("{url}?size=64")),
            can_manage: snapshot_allows(g.permission_bits(), MANAGE_ANY, g.owner),
            id: g.id,
            name: g.name,
        })
        .collect();

    Ok(Json(serde_json::json!({ "ok": true, "guilds": guilds })))
}

#[derive(Debug, Deserialize)]
struct StructureQuery {
    guild_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct ChannelOut {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    position: i64,
    parent_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
struct RoleOut {
    id: String,
    name: String,
    position: i64,
}

/// Channels, categories, and roles of a guild the caller manages.
///
/// Membership and the permission check come from the caller's own guild
/// list (aggregate permission snapshot); the structure itself requires
/// the bot credential since user tokens cannot read it.
#[utoipa::path(
    get,
    path = "/api/guild-structure",
    tag = GUILD_TAG,
    params(("guild_id" = String, Query, description = "Guild to inspect")),
    responses(
        (status = 200, description = "Channels, categories and roles"),
        (status = 400, description = "Missing guild_id"),
        (status = 401, description = "No session or expired upstream credential"),
        (status = 403, description = "Caller not in guild or lacking permissions"),
        (status = 502, description = "Upstream lookup failed")
    )
)]
async fn guild_structure(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<StructureQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = query
        .guild_id
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_guild_id"))?;

    let credential = upstream_credential(&session)?;
    let discord = DiscordClient::from_state(&state);

    let member_guilds = discord.fetch_member_guilds(credential).await.map_err(|e| {
        if e.is_auth_rejection() {
            ApiError::unauthorized("expired_session")
        } else {
            warn!("Guild listing failed: {e}");
            ApiError::bad_gateway("discord_me_guilds_failed")
        }
    })?;

    let membership = member_guilds
        .iter()
        .find(|g| g.id == guild_id)
        .ok_or_else(|| ApiError::forbidden("not_in_guild"))?;
    if !snapshot_allows(membership.permission_bits(), MANAGE_ANY, membership.owner) {
        return Err(ApiError::forbidden("insufficient_permissions"));
    }

    let bot_token = state.config.discord.bot.trim();
    if bot_token.is_empty() {
        return Err(ApiError::internal("missing_bot_token"));
    }

    let channels_raw = discord
        .fetch_guild_channels(bot_token, guild_id)
        .await
        .map_err(|e| {
            warn!("Channel fetch failed for {guild_id}: {e}");
            ApiError::bad_gateway("discord_channels_failed")
        })?;
    let roles_raw = discord
        .fetch_guild_roles(bot_token, guild_id)
        .await
        .map_err(|e| {
            warn!("Role fetch failed for {guild_id}: {e}");
            ApiError::bad_gateway("discord_roles_failed")
        })?;

    let mut channels: Vec<ChannelOut> = channels_raw
        .into_iter()
        .map(|c| ChannelOut {
            id: c.id,
            name: c.name,
            kind: c.kind,
            position: c.position,
            parent_id: c.parent_id,
        })
        .collect();
    channels.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));

    let mut roles: Vec<RoleOut> = roles_raw
        .into_iter()
        .map(|r| RoleOut {
            id: r.id,
            name: r.name,
            position: r.position,
        })
        .collect();
    roles.sort_by(|a, b| b.position.cmp(&a.position).then_with(|| a.name.cmp(&b.name)));

    // Categories are channel entries too; the dashboard gets them split
    // out for building its pickers.
    let categories: Vec<&ChannelOut> = channels.iter().filter(|c| c.kind == 4).collect();

    Ok(Json(serde_json::json!({
        "ok": true,
        "channels": channels,
        "roles": roles,
        "categories": categories,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guilds", get(list_guilds))
        .route("/guild-structure", get(guild_structure))
}
