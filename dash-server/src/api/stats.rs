//! Public stats snapshot: read by the landing page, pushed by the bot.

use crate::auth::ingest_authorized;
use crate::errors::ApiError;
use crate::kv::KvClient;
use crate::openapi::INGEST_TAG;
use crate::state::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use log::warn;
use serde_json::Value;

const LATEST_KEY: &str = "stats:latest";
const HISTORY_KEY: &str = "stats:history";
/// One day of history at a five minute push cadence
const HISTORY_LEN: i64 = 288;

/// Latest stats snapshot. Public; degrades to a null snapshot rather than
/// failing when the store is unreachable.
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = INGEST_TAG,
    responses(
        (status = 200, description = "Latest snapshot, or null when none is stored")
    )
)]
async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    let kv = KvClient::from_state(&state);
    let stats = match kv.get(LATEST_KEY).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        Ok(None) => Value::Null,
        Err(e) => {
            warn!("Stats read failed: {e}");
            Value::Null
        }
    };
    Json(serde_json::json!({ "ok": true, "stats": stats }))
}

/// Bot push of a stats snapshot: stored as the latest and prepended to a
/// bounded history list.
#[utoipa::path(
    post,
    path = "/api/stats",
    tag = INGEST_TAG,
    responses(
        (status = 200, description = "Snapshot stored"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 401, description = "Ingest token missing or wrong")
    )
)]
async fn push_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if !ingest_authorized(&headers, &state.config.ingest) {
        return Err(ApiError::unauthorized("unauthorized"));
    }
    if !payload.is_object() {
        return Err(ApiError::bad_request("bad_json"));
    }

    let serialized = payload.to_string();
    let kv = KvClient::from_state(&state);
    kv.set(LATEST_KEY, &serialized).await?;
    kv.lpush(HISTORY_KEY, &serialized).await?;
    kv.ltrim(HISTORY_KEY, 0, HISTORY_LEN - 1).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/stats", post(push_stats))
}

#[cfg(test)]
mod test {
    use crate::test_utils::TestFixture;
    use http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_get_stats_returns_snapshot() {
        let fixture = TestFixture::new().await;
        Mock::given(method("POST"))
            .and(body_json(json!(["GET", "stats:latest"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "{\"guilds\":3,\"users\":150}"
            })))
            .mount(&fixture.kv_mock)
            .await;

        let resp = fixture.get_raw("/api/stats").await;
        resp.assert_ok();
        assert_eq!(resp.json["stats"]["guilds"], 3);
        assert_eq!(resp.json["stats"]["users"], 150);
    }

    #[tokio::test]
    async fn test_get_stats_degrades_to_null() {
        let fixture = TestFixture::new().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&fixture.kv_mock)
            .await;

        let resp = fixture.get_raw("/api/stats").await;
        resp.assert_ok();
        assert_eq!(resp.json["stats"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_push_stats_requires_ingest_token() {
        let fixture = TestFixture::new().await;
        let resp = fixture.post_raw("/api/stats", &json!({"guilds": 3})).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resp.json["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_push_stats_stores_and_trims_history() {
        let fixture = TestFixture::new().await;
        let snapshot = "{\"guilds\":3,\"users\":150}";
        Mock::given(method("POST"))
            .and(body_json(json!(["SET", "stats:latest", snapshot])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "OK"})))
            .expect(1)
            .mount(&fixture.kv_mock)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!(["LPUSH", "stats:history", snapshot])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
            .expect(1)
            .mount(&fixture.kv_mock)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!(["LTRIM", "stats:history", "0", "287"])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "OK"})))
            .expect(1)
            .mount(&fixture.kv_mock)
            .await;

        let resp = fixture
            .post_with_ingest("/api/stats", &json!({"guilds": 3, "users": 150}))
            .await;
        resp.assert_ok();
    }

    #[tokio::test]
    async fn test_push_stats_rejects_non_object() {
        let fixture = TestFixture::new().await;
        let resp = fixture.post_with_ingest("/api/stats", &json!([1, 2, 3])).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.json["error"], "bad_json");
    }
}
