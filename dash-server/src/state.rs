use crate::cache::{Cache, CacheBackend};
use crate::config::DashConfig;
use chrono::Duration;
use dash_core::{TokenCodec, Tokens};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashConfig>,
    pub tokens: Arc<Tokens>,
    pub cache: Arc<Cache>,
    pub http: Arc<Client>,
}

impl AppState {
    /// Build the application state. Fails when the signing secret is not
    /// configured: the server refuses to start rather than falling back
    /// to a guessable default key.
    pub fn new(config: DashConfig, cache: Cache) -> Result<Self, String> {
        if config.secret.trim().is_empty() {
            return Err("DASH_SECRET must be set to a non-empty signing secret".to_string());
        }

        let tokens = Tokens::new(
            TokenCodec::new(config.secret.as_bytes().to_vec()),
            Duration::seconds(config.state.ttl as i64),
            Duration::seconds(config.session.ttl as i64),
        );
        let http = Self::create_http_client(config.discord.timeout.max(config.kv.timeout));

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            cache: Arc::new(cache),
            http: Arc::new(http),
        })
    }

    fn create_http_client(timeout: u64) -> Client {
        // One pooled client for both collaborators; auth headers are set
        // per call because Discord uses Bearer/Bot prefixes while the kv
        // store uses its own bearer token.
        Client::builder()
            .timeout(StdDuration::from_secs(timeout))
            .connect_timeout(StdDuration::from_secs(2))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(StdDuration::from_secs(90)))
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> bool {
        self.cache.health_check().await.is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::null::NullCache;

    pub(crate) fn create_test_state(config: DashConfig) -> AppState {
        AppState::new(config, Cache::Null(NullCache::new()))
            .expect("Failed to create test state")
    }

    fn test_config() -> DashConfig {
        DashConfig {
            secret: "test-secret".to_string(),
            site: "https://dash.test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let config = DashConfig::default();
        let result = AppState::new(config, Cache::Null(NullCache::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_whitespace_secret_is_rejected() {
        let config = DashConfig {
            secret: "   ".to_string(),
            ..Default::default()
        };
        let result = AppState::new(config, Cache::Null(NullCache::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_state_clone_shares_data() {
        let state = create_test_state(test_config());
        let state2 = state.clone();
        assert_eq!(Arc::as_ptr(&state.config), Arc::as_ptr(&state2.config));
        assert_eq!(Arc::as_ptr(&state.cache), Arc::as_ptr(&state2.cache));
    }

    #[tokio::test]
    async fn test_health_check_with_null_cache() {
        let state = create_test_state(test_config());
        assert!(state.health_check().await);
    }
}
