//! Client for the REST-fronted key-value store.
//!
//! Commands are posted as JSON arrays (`["HSET", key, field, value]`) to
//! the store's base URL; responses come back in a `{"result": ...}` /
//! `{"error": ...}` envelope. Guild settings, stats snapshots, and
//! command logs all live here.

use crate::config::DashConfig;
use crate::state::AppState;
use http::StatusCode;
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Key-value store is not configured")]
    NotConfigured,
    #[error("Key-value request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Key-value store returned status {0}")]
    Status(StatusCode),
    #[error("Failed to parse key-value response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Key-value command failed: {0}")]
    Command(String),
}

impl From<KvError> for crate::errors::ApiError {
    fn from(e: KvError) -> Self {
        match e {
            KvError::NotConfigured => crate::errors::ApiError::internal("kv_not_configured"),
            other => {
                warn!("Key-value operation failed: {other}");
                crate::errors::ApiError::bad_gateway("kv_failed")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct KvResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct KvClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl KvClient {
    pub fn new(client: reqwest::Client, config: &DashConfig) -> Self {
        // A url without a token (or vice versa) counts as unconfigured.
        let url = if config.kv.configured() {
            config.kv.url.trim_end_matches('/').to_string()
        } else {
            String::new()
        };
        Self {
            client,
            url,
            token: config.kv.token.clone(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new((*state.http).clone(), &state.config)
    }

    async fn command(&self, command: Value) -> Result<Value, KvError> {
        if self.url.is_empty() {
            return Err(KvError::NotConfigured);
        }

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Key-value command returned {status}");
            return Err(KvError::Status(status));
        }

        let body = response.bytes().await?;
        let envelope: KvResponse = serde_json::from_slice(&body)?;
        if let Some(error) = envelope.error {
            return Err(KvError::Command(error));
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let result = self.command(json!(["GET", key])).await?;
        Ok(value_to_string(result))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.command(json!(["SET", key, value])).await?;
        Ok(())
    }

    /// Read a hash as a field map. The store may return hashes as a JSON
    /// object, a flat `[field, value, ...]` array, or an array of
    /// two-element pairs; all three shapes normalize to the same map.
    pub async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, KvError> {
        let result = self.command(json!(["HGETALL", key])).await?;
        Ok(hash_from_value(result))
    }

    pub async fn hset(&self, key: &str, fields: &BTreeMap<String, String>) -> Result<(), KvError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut command = vec![json!("HSET"), json!(key)];
        for (field, value) in fields {
            command.push(json!(field));
            command.push(json!(value));
        }
        self.command(Value::Array(command)).await?;
        Ok(())
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.command(json!(["LPUSH", key, value])).await?;
        Ok(())
    }

    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.command(json!(["LTRIM", key, start.to_string(), stop.to_string()]))
            .await?;
        Ok(())
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let result = self
            .command(json!(["LRANGE", key, start.to_string(), stop.to_string()]))
            .await?;
        match result {
            Value::Array(items) => Ok(items.into_iter().filter_map(value_to_string).collect()),
            _ => Ok(Vec::new()),
        }
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn hash_from_value(value: Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    match value {
        Value::Object(fields) => {
            for (field, value) in fields {
                if let Some(value) = value_to_string(value) {
                    map.insert(field, value);
                }
            }
        }
        Value::Array(items) => {
            // Pair-array shape: [["field", "value"], ...]
            if items.iter().all(|i| matches!(i, Value::Array(_))) && !items.is_empty() {
                for item in items {
                    if let Value::Array(pair) = item {
                        let mut pair = pair.into_iter();
                        if let (Some(field), Some(value)) = (pair.next(), pair.next()) {
                            if let (Some(field), Some(value)) =
                                (value_to_string(field), value_to_string(value))
                            {
                                map.insert(field, value);
                            }
                        }
                    }
                }
            } else {
                // Flat shape: ["field", "value", "field", "value", ...]
                let mut items = items.into_iter();
                while let (Some(field), Some(value)) = (items.next(), items.next()) {
                    if let (Some(field), Some(value)) =
                        (value_to_string(field), value_to_string(value))
                    {
                        map.insert(field, value);
                    }
                }
            }
        }
        _ => {}
    }
    map
}
