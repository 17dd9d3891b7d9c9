pub(crate) use crate::config::cache::{CacheConfig, CacheStore};
use crate::config::discord::DiscordConfig;
use crate::config::kv::KvConfig;
use config::{Config as ConfigCrate, ConfigError};
use serde::Deserialize;

pub mod cache;
pub mod discord;
pub mod kv;

/// Main configuration structure for the dashboard server
#[derive(Debug, Deserialize, Clone)]
pub struct DashConfig {
    /// The port the server will listen to (default: 7900)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL of the site, used to build the OAuth redirect URI
    #[serde(default)]
    pub site: String,

    /// Secret key for signing state and session tokens - mandatory,
    /// startup fails when it is empty
    #[serde(default)]
    pub secret: String,

    /// Bearer token guarding the bot ingest endpoints. When empty, ingest
    /// pushes are accepted unauthenticated.
    #[serde(default)]
    pub ingest: String,

    /// Session token configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// State (CSRF) token configuration
    #[serde(default)]
    pub state: StateConfig,

    /// Discord API configuration
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Key-value store (REST) configuration
    #[serde(default)]
    pub kv: KvConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_port() -> u16 {
    7900
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            site: String::new(),
            secret: String::new(),
            ingest: String::new(),
            session: SessionConfig::default(),
            state: StateConfig::default(),
            discord: DiscordConfig::default(),
            kv: KvConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Session token settings
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Session TTL in seconds (default: 12 hours, clamped by dash-core)
    #[serde(default = "default_session_ttl")]
    pub ttl: u64,

    /// Name of the session cookie
    #[serde(default = "default_cookie")]
    pub cookie: String,
}

fn default_session_ttl() -> u64 {
    12 * 3600
}

fn default_cookie() -> String {
    "dash_session".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_session_ttl(),
            cookie: default_cookie(),
        }
    }
}

/// State (CSRF) token settings
#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    /// State token TTL in seconds (default: 10 minutes)
    #[serde(default = "default_state_ttl")]
    pub ttl: u64,
}

fn default_state_ttl() -> u64 {
    600
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            ttl: default_state_ttl(),
        }
    }
}

impl DashConfig {
    /// Creates a new config instance from `DASH_*` environment variables
    pub fn new() -> Result<Self, String> {
        ConfigCrate::builder()
            .add_source(
                config::Environment::with_prefix("DASH")
                    .prefix_separator("_")
                    .separator("_")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(
        discord_mock: &wiremock::MockServer,
        kv_mock: &wiremock::MockServer,
    ) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            site: "https://dash.test".to_string(),
            secret: "test-secret".to_string(),
            ingest: "test-ingest-token".to_string(),
            session: SessionConfig::default(),
            state: StateConfig::default(),
            discord: DiscordConfig {
                id: "test-client-id".to_string(),
                secret: "test-client-secret".to_string(),
                bot: "test-bot-token".to_string(),
                api: discord_mock.uri(),
                authorize: format!("{}/oauth2/authorize", discord_mock.uri()),
                cdn: "https://cdn.discordapp.com".to_string(),
                timeout: 5,
            },
            kv: KvConfig {
                url: kv_mock.uri(),
                token: "test-kv-token".to_string(),
                timeout: 5,
            },
            cache: CacheConfig {
                ttl: 60,
                store: CacheStore::None,
                ..Default::default()
            },
        }
    }
}
