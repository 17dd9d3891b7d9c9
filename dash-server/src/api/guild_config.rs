//! Per-guild dashboard settings, stored as a hash in the kv store.

use crate::auth::CurrentSession;
use crate::authz::ensure_guild_admin;
use crate::errors::ApiError;
use crate::kv::KvClient;
use crate::openapi::GUILD_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

fn config_key(guild_id: &str) -> String {
    format!("guild:{guild_id}:config")
}

#[derive(Debug, Deserialize)]
struct ConfigQuery {
    guild_id: Option<String>,
}

fn require_guild_id(guild_id: Option<&str>) -> Result<&str, ApiError> {
    guild_id
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_guild_id"))
}

/// Read a guild's dashboard settings.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = GUILD_TAG,
    params(("guild_id" = String, Query, description = "Guild whose settings to read")),
    responses(
        (status = 200, description = "Current settings, absent fields null"),
        (status = 400, description = "Missing guild_id"),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller not in guild or lacking permissions")
    )
)]
async fn get_config(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<ConfigQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = require_guild_id(query.guild_id.as_deref())?;
    ensure_guild_admin(&state, &session, guild_id).await?;

    let kv = KvClient::from_state(&state);
    let stored = kv.hgetall(&config_key(guild_id)).await?;

    let field = |name: &str| stored.get(name).cloned();
    Ok(Json(serde_json::json!({
        "ok": true,
        "config": {
            "rating_channel": field("rating_channel"),
            "result_channel": field("result_channel"),
            "ticket_category": field("ticket_category"),
            "ticket_staff_role": field("ticket_staff_role"),
            "ticket_log_channel": field("ticket_log_channel"),
        }
    })))
}

/// Settings update. Absent fields are left untouched; an explicit null on
/// `ticket_log_channel_id` clears the stored value. Earlier dashboard
/// builds cleared `ticket_log_channel` on every write; here omission
/// never clears, only `null` does.
#[derive(Debug, Deserialize, ToSchema)]
struct ConfigUpdate {
    guild_id: Option<String>,
    rating_channel_id: Option<String>,
    result_channel_id: Option<String>,
    ticket_category_id: Option<String>,
    ticket_staff_role_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_clearable")]
    ticket_log_channel_id: Option<Option<String>>,
}

// Distinguishes "field absent" (outer None) from "field: null" (inner
// None), which clears the value.
fn deserialize_clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::<String>::deserialize(deserializer)?))
}

/// Write a guild's dashboard settings.
#[utoipa::path(
    post,
    path = "/api/config",
    tag = GUILD_TAG,
    responses(
        (status = 200, description = "Settings written"),
        (status = 400, description = "Missing guild_id or no recognized fields"),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller not in guild or lacking permissions")
    )
)]
async fn set_config(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild_id = require_guild_id(update.guild_id.as_deref())?;
    ensure_guild_admin(&state, &session, guild_id).await?;

    let mut fields = BTreeMap::new();
    let mut set = |name: &str, value: &Option<String>| {
        if let Some(value) = value {
            fields.insert(name.to_string(), value.clone());
        }
    };
    set("rating_channel", &update.rating_channel_id);
    set("result_channel", &update.result_channel_id);
    set("ticket_category", &update.ticket_category_id);
    set("ticket_staff_role", &update.ticket_staff_role_id);
    if let Some(value) = &update.ticket_log_channel_id {
        fields.insert(
            "ticket_log_channel".to_string(),
            value.clone().unwrap_or_default(),
        );
    }

    if fields.is_empty() {
        return Err(ApiError::bad_request("no_fields_to_set"));
    }

    let kv = KvClient::from_state(&state);
    kv.hset(&config_key(guild_id), &fields).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/config", post(set_config))
}

#[cfg(test)]
mod test {
    use crate::test_utils::TestFixture;
    use http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn mount_owner_guild(fixture: &TestFixture, guild_id: &str, owner_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/guilds/{guild_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": guild_id,
                "name": "G",
                "owner_id": owner_id
            })))
            .mount(&fixture.discord_mock)
            .await;
    }

    #[tokio::test]
    async fn test_get_config_requires_guild_id() {
        let fixture = TestFixture::new().await;
        let token = fixture.session_token("42", "tester");
        let resp = fixture.get_with_session("/api/config", &token).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.json["error"], "missing_guild_id");
    }

    #[tokio::test]
    async fn test_get_config_reads_hash() {
        let fixture = TestFixture::new().await;
        mount_owner_guild(&fixture, "10", "42").await;
        Mock::given(method("POST"))
            .and(body_json(json!(["HGETALL", "guild:10:config"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": ["rating_channel", "111", "ticket_log_channel", "222"]
            })))
            .mount(&fixture.kv_mock)
            .await;

        let token = fixture.session_token("42", "tester");
        let resp = fixture
            .get_with_session("/api/config?guild_id=10", &token)
            .await;
        resp.assert_ok();
        assert_eq!(resp.json["config"]["rating_channel"], "111");
        assert_eq!(resp.json["config"]["ticket_log_channel"], "222");
        assert_eq!(resp.json["config"]["result_channel"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_set_config_writes_present_fields_only() {
        let fixture = TestFixture::new().await;
        mount_owner_guild(&fixture, "10", "42").await;
        Mock::given(method("POST"))
            .and(body_json(json!([
                "HSET",
                "guild:10:config",
                "rating_channel",
                "111",
                "ticket_log_channel",
                ""
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 2})))
            .expect(1)
            .mount(&fixture.kv_mock)
            .await;

        let token = fixture.session_token("42", "tester");
        let resp = fixture
            .post_with_session(
                "/api/config",
                &json!({
                    "guild_id": "10",
                    "rating_channel_id": "111",
                    "ticket_log_channel_id": null
                }),
                &token,
            )
            .await;
        resp.assert_ok();
        assert_eq!(resp.json["ok"], true);
    }

    #[tokio::test]
    async fn test_set_config_rejects_empty_update() {
        let fixture = TestFixture::new().await;
        mount_owner_guild(&fixture, "10", "42").await;

        let token = fixture.session_token("42", "tester");
        let resp = fixture
            .post_with_session("/api/config", &json!({"guild_id": "10"}), &token)
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.json["error"], "no_fields_to_set");
    }

    #[tokio::test]
    async fn test_set_config_requires_management_rights() {
        let fixture = TestFixture::new().await;
        mount_owner_guild(&fixture, "10", "1").await;
        Mock::given(method("GET"))
            .and(path("/guilds/10/members/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"roles": []})))
            .mount(&fixture.discord_mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/guilds/10/roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "10", "name": "@everyone", "permissions": "1024", "position": 0}
            ])))
            .mount(&fixture.discord_mock)
            .await;

        let token = fixture.session_token("42", "tester");
        let resp = fixture
            .post_with_session(
                "/api/config",
                &json!({"guild_id": "10", "rating_channel_id": "111"}),
                &token,
            )
            .await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert_eq!(resp.json["error"], "insufficient_permissions");
    }

    #[tokio::test]
    async fn test_kv_not_configured_is_distinguishable() {
        let mut builder = TestFixture::builder().await;
        builder.config.kv.url = String::new();
        let fixture = builder.build().await;
        mount_owner_guild(&fixture, "10", "42").await;

        let token = fixture.session_token("42", "tester");
        let resp = fixture
            .get_with_session("/api/config?guild_id=10", &token)
            .await;
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.json["error"], "kv_not_configured");
    }
}
