//! OAuth login flow and session endpoints.
//!
//! The CSRF state travels inside a signed token (no state cookie), and the
//! issued session token is delivered twice: as an HttpOnly cookie and in
//! the redirect URL fragment for sessionStorage-based clients.

use crate::auth::CurrentSession;
use crate::discord::DiscordClient;
use crate::errors::ApiError;
use crate::openapi::AUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dash_core::{SessionIdentity, SESSION_TTL_MAX_SECS, SESSION_TTL_MIN_SECS};
use http::header::LOCATION;
use log::{error, warn};
use serde::Deserialize;

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

fn callback_uri(state: &AppState) -> String {
    format!("{}/api/callback", state.config.site.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    /// Path to land on after login
    #[serde(rename = "return")]
    return_path: Option<String>,
}

/// Start the OAuth dance: issue a state token and redirect to the
/// provider's authorize URL.
#[utoipa::path(
    get,
    path = "/api/login",
    tag = AUTH_TAG,
    responses(
        (status = 302, description = "Redirect to the authorization URL"),
        (status = 503, description = "OAuth client credentials are not configured")
    )
)]
async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, ApiError> {
    if !state.config.discord.oauth_configured() {
        return Err(ApiError::service_unavailable("server_not_configured"));
    }

    let state_token = state
        .tokens
        .issue_state(query.return_path.as_deref().unwrap_or("/"))
        .map_err(|e| {
            error!("Failed to issue state token: {e}");
            ApiError::internal("token_error")
        })?;

    let query_string = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", &state.config.discord.id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &callback_uri(&state))
        .append_pair("scope", "identify guilds")
        .append_pair("state", &state_token)
        .append_pair("prompt", "consent")
        .finish();

    Ok(found(&format!(
        "{}?{}",
        state.config.discord.authorize, query_string
    )))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Complete the OAuth dance: validate state, exchange the code, fetch the
/// identity, and establish the session.
#[utoipa::path(
    get,
    path = "/api/callback",
    tag = AUTH_TAG,
    responses(
        (status = 302, description = "Session established, redirect to the return path"),
        (status = 400, description = "Missing code or invalid/expired state"),
        (status = 502, description = "Upstream exchange or identity lookup failed")
    )
)]
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("bad_state"))?;
    let state_token = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("bad_state"))?;

    let oauth_state = state
        .tokens
        .parse_state(state_token)
        .ok_or_else(|| ApiError::bad_request("bad_state"))?;

    if !state.config.discord.oauth_configured() {
        return Err(ApiError::service_unavailable("server_not_configured"));
    }

    let discord = DiscordClient::from_state(&state);
    let exchange = discord
        .exchange_code(code, &callback_uri(&state))
        .await
        .map_err(|e| {
            warn!("OAuth code exchange failed: {e}");
            ApiError::bad_gateway("oauth_failed")
        })?;

    let identity = discord
        .fetch_identity(&exchange.access_token)
        .await
        .map_err(|e| {
            warn!("Identity lookup failed: {e}");
            ApiError::bad_gateway("discord_identity_failed")
        })?;

    let session_token = state
        .tokens
        .issue_session(
            SessionIdentity {
                user_id: identity.id.clone(),
                username: identity.display_name(),
                avatar_ref: identity.avatar.clone(),
            },
            Some(exchange.access_token),
        )
        .map_err(|e| {
            error!("Failed to issue session token: {e}");
            ApiError::internal("token_error")
        })?;

    let jar = jar.add(session_cookie(&state, session_token.clone()));
    let target = format!("{}#token={}", oauth_state.return_path, session_token);
    Ok((jar, found(&target)).into_response())
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = (state.config.session.ttl as i64).clamp(SESSION_TTL_MIN_SECS, SESSION_TTL_MAX_SECS);
    Cookie::build((state.config.session.cookie.clone(), token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

#[derive(Debug, Deserialize)]
struct LogoutQuery {
    redirect: Option<String>,
}

/// Clear the session cookie and redirect. The token itself stays valid
/// until it expires; there is no server-side revocation.
#[utoipa::path(
    get,
    path = "/api/logout",
    tag = AUTH_TAG,
    responses(
        (status = 302, description = "Cookie cleared, redirect to the requested path")
    )
)]
async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
    jar: CookieJar,
) -> Response {
    let target = match query.redirect.as_deref() {
        Some(path) if path.starts_with('/') => path.to_string(),
        _ => "/".to_string(),
    };

    let removal = Cookie::build((state.config.session.cookie.clone(), ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build();
    let jar = jar.add(removal);

    (jar, found(&target)).into_response()
}

/// Echo the verified session payload.
#[utoipa::path(
    get,
    path = "/api/me",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "The caller's session"),
        (status = 401, description = "No valid session")
    )
)]
async fn me(CurrentSession(session): CurrentSession) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "user": {
            "id": session.user_id,
            "username": session.username,
            "avatar": session.avatar_ref,
        },
        "expiresAt": session.expires_at,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .route("/me", get(me))
}
