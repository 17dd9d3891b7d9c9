use serde::Deserialize;

/// Configuration for the REST key-value store collaborator.
///
/// An empty url/token pair is a configuration error surfaced per request
/// (distinct from client auth failures), not a data error.
#[derive(Debug, Deserialize, Clone)]
pub struct KvConfig {
    /// Base URL of the REST endpoint
    #[serde(default)]
    pub url: String,

    /// Bearer token for the REST endpoint
    #[serde(default)]
    pub token: String,

    /// Request timeout in seconds (default: 5)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    5
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl KvConfig {
    pub fn configured(&self) -> bool {
        !self.url.is_empty() && !self.token.is_empty()
    }
}
