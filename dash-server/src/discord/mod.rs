//! Thin client for the Discord REST API.
//!
//! All upstream calls the dashboard makes go through here: the OAuth code
//! exchange and identity lookup on the user's behalf, and guild lookups on
//! the bot's behalf. The shared reqwest client is pooled by the
//! application state; this module only shapes requests and responses.

use crate::config::DashConfig;
use crate::state::AppState;
use http::StatusCode;
use log::warn;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod models;

pub use models::{Channel, Guild, GuildMember, GuildRole, Identity, MemberGuild, TokenExchange};

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("Discord request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Discord returned status {0}")]
    Status(StatusCode),
    #[error("Failed to parse Discord response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DiscordError {
    /// Whether the upstream rejected the credential itself (expired or
    /// revoked OAuth token) rather than the request.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::Status(StatusCode::UNAUTHORIZED) | Self::Status(StatusCode::FORBIDDEN)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(StatusCode::NOT_FOUND))
    }
}

/// Credential to present upstream
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// User OAuth access token
    Bearer(&'a str),
    /// Bot token
    Bot(&'a str),
}

impl Auth<'_> {
    fn header_value(&self) -> String {
        match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::Bot(token) => format!("Bot {token}"),
        }
    }
}

#[derive(Clone)]
pub struct DiscordClient {
    client: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl DiscordClient {
    pub fn new(client: reqwest::Client, config: &DashConfig) -> Self {
        Self {
            client,
            api_base: config.discord.api.trim_end_matches('/').to_string(),
            client_id: config.discord.id.clone(),
            client_secret: config.discord.secret.clone(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new((*state.http).clone(), &state.config)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<T, DiscordError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .header(http::header::AUTHORIZATION, auth.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.is_server_error() {
                warn!("Discord GET {path} returned {status}");
            }
            return Err(DiscordError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Exchange an OAuth authorization code for an access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchange, DiscordError> {
        let url = format!("{}/oauth2/token", self.api_base);
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.client.post(&url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("OAuth code exchange failed with {status}");
            return Err(DiscordError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Identity of the user who owns the access token.
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity, DiscordError> {
        self.get_json("/users/@me", Auth::Bearer(access_token)).await
    }

    /// Guilds the user is a member of, with their aggregate permissions.
    pub async fn fetch_member_guilds(
        &self,
        access_token: &str,
    ) -> Result<Vec<MemberGuild>, DiscordError> {
        self.get_json("/users/@me/guilds", Auth::Bearer(access_token))
            .await
    }

    /// Guild metadata, including the owner id. Bot credential.
    pub async fn fetch_guild(&self, bot_token: &str, guild_id: &str) -> Result<Guild, DiscordError> {
        self.get_json(&format!("/guilds/{guild_id}"), Auth::Bot(bot_token))
            .await
    }

    /// All roles defined in a guild. Bot credential.
    pub async fn fetch_guild_roles(
        &self,
        bot_token: &str,
        guild_id: &str,
    ) -> Result<Vec<GuildRole>, DiscordError> {
        self.get_json(&format!("/guilds/{guild_id}/roles"), Auth::Bot(bot_token))
            .await
    }

    /// A user's membership in a guild; 404 means not a member.
    pub async fn fetch_guild_member(
        &self,
        bot_token: &str,
        guild_id: &str,
        user_id: &str,
    ) -> Result<GuildMember, DiscordError> {
        self.get_json(
            &format!("/guilds/{guild_id}/members/{user_id}"),
            Auth::Bot(bot_token),
        )
        .await
    }

    /// All channels of a guild. Bot credential.
    pub async fn fetch_guild_channels(
        &self,
        bot_token: &str,
        guild_id: &str,
    ) -> Result<Vec<Channel>, DiscordError> {
        self.get_json(&format!("/guilds/{guild_id}/channels"), Auth::Bot(bot_token))
            .await
    }
}

/// CDN URL for a guild or user icon, or None when no icon hash is set.
pub fn icon_url(cdn_base: &str, kind: &str, id: &str, hash: Option<&str>) -> Option<String> {
    hash.map(|hash| {
        format!(
            "{}/{kind}/{id}/{hash}.png",
            cdn_base.trim_end_matches('/')
        )
    })
}
