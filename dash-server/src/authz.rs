//! Guild-level authorization for management endpoints.
//!
//! A caller may manage a guild when they own it or when any of their
//! roles (the guild-wide default role included) carries ADMINISTRATOR or
//! MANAGE_GUILD. Role data is fetched with the bot credential and the
//! resolved snapshot is cached so repeated dashboard calls do not hammer
//! the Discord API.

use crate::cache::CacheBackend;
use crate::discord::DiscordClient;
use crate::errors::ApiError;
use crate::state::AppState;
use dash_core::{GuildResource, Member, RoleSet, SessionPayload, MANAGE_ANY};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Resolved permission snapshot for one (guild, user) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzSnapshot {
    pub bits: u64,
    pub is_owner: bool,
}

impl AuthzSnapshot {
    pub fn allows_management(&self) -> bool {
        dash_core::snapshot_allows(self.bits, MANAGE_ANY, self.is_owner)
    }
}

fn cache_key(guild_id: &str, user_id: &str) -> String {
    format!("authz:{guild_id}:{user_id}")
}

/// Resolve the caller's permission snapshot for a guild, from cache when
/// fresh, otherwise from the Discord API with the bot credential.
pub async fn resolve_snapshot(
    state: &AppState,
    session: &SessionPayload,
    guild_id: &str,
) -> Result<AuthzSnapshot, ApiError> {
    let bot_token = state.config.discord.bot.trim();
    if bot_token.is_empty() {
        return Err(ApiError::internal("missing_bot_token"));
    }

    let key = cache_key(guild_id, &session.user_id);
    if let Ok(Some(snapshot)) = state.cache.get::<AuthzSnapshot>(&key).await {
        debug!("Authz cache hit for {key}");
        return Ok(snapshot);
    }

    let discord = DiscordClient::from_state(state);

    let guild = discord.fetch_guild(bot_token, guild_id).await.map_err(|e| {
        warn!("Guild lookup failed for {guild_id}: {e}");
        ApiError::bad_gateway("discord_guild_failed")
    })?;

    let resource = GuildResource {
        id: guild.id.clone(),
        owner_id: guild.owner_id.clone(),
    };

    if resource.owner_id == session.user_id {
        let snapshot = AuthzSnapshot {
            bits: u64::MAX,
            is_owner: true,
        };
        store_snapshot(state, &key, &snapshot).await;
        return Ok(snapshot);
    }

    let member = match discord
        .fetch_guild_member(bot_token, guild_id, &session.user_id)
        .await
    {
        Ok(member) => member,
        Err(e) if e.is_not_found() => {
            return Err(ApiError::forbidden("not_in_guild"));
        }
        Err(e) => {
            warn!("Member lookup failed for {guild_id}: {e}");
            return Err(ApiError::bad_gateway("discord_member_failed"));
        }
    };

    let roles = discord
        .fetch_guild_roles(bot_token, guild_id)
        .await
        .map_err(|e| {
            warn!("Role lookup failed for {guild_id}: {e}");
            ApiError::bad_gateway("discord_roles_failed")
        })?;

    let role_set = RoleSet::from_roles(roles.iter().map(|r| dash_core::Role {
        id: r.id.clone(),
        permissions: r.permission_bits(),
    }));
    let member = Member {
        user_id: session.user_id.clone(),
        role_ids: member.roles,
    };

    let snapshot = AuthzSnapshot {
        bits: dash_core::effective_bits(&resource, &role_set, &member),
        is_owner: false,
    };
    store_snapshot(state, &key, &snapshot).await;
    Ok(snapshot)
}

/// Require management rights on a guild, mapping the snapshot to the
/// uniform error vocabulary.
pub async fn ensure_guild_admin(
    state: &AppState,
    session: &SessionPayload,
    guild_id: &str,
) -> Result<AuthzSnapshot, ApiError> {
    let snapshot = resolve_snapshot(state, session, guild_id).await?;
    if !snapshot.allows_management() {
        return Err(ApiError::forbidden("insufficient_permissions"));
    }
    Ok(snapshot)
}

async fn store_snapshot(state: &AppState, key: &str, snapshot: &AuthzSnapshot) {
    if let Err(e) = state.cache.set(key, snapshot).await {
        warn!("Failed to cache authz snapshot {key}: {e}");
    }
}
