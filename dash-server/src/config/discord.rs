use serde::Deserialize;

/// Configuration for the Discord API collaborator
#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    /// OAuth application client id
    #[serde(default)]
    pub id: String,

    /// OAuth application client secret
    #[serde(default)]
    pub secret: String,

    /// Bot token used for guild/role/member lookups that user tokens
    /// cannot perform
    #[serde(default)]
    pub bot: String,

    /// Base URL of the Discord REST API
    #[serde(default = "default_api")]
    pub api: String,

    /// OAuth authorize endpoint the browser is redirected to
    #[serde(default = "default_authorize")]
    pub authorize: String,

    /// CDN base URL for guild icons
    #[serde(default = "default_cdn")]
    pub cdn: String,

    /// Request timeout in seconds for Discord API calls (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_api() -> String {
    "https://discord.com/api".to_string()
}

fn default_authorize() -> String {
    "https://discord.com/oauth2/authorize".to_string()
}

fn default_cdn() -> String {
    "https://cdn.discordapp.com".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            secret: String::new(),
            bot: String::new(),
            api: default_api(),
            authorize: default_authorize(),
            cdn: default_cdn(),
            timeout: default_timeout(),
        }
    }
}

impl DiscordConfig {
    /// True when the OAuth exchange can be attempted at all
    pub fn oauth_configured(&self) -> bool {
        !self.id.is_empty() && !self.secret.is_empty()
    }
}
