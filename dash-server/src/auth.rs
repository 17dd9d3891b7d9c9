//! Session extraction for incoming requests.
//!
//! A session token may arrive in three carriers; the resolution order is
//! a compatibility contract and must not change:
//!   1. `Authorization: Bearer <token>` header
//!   2. `token` query parameter
//!   3. the named session cookie

use crate::errors::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use dash_core::SessionPayload;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::warn;

/// Resolve a token from the supported carriers, first match wins.
pub fn extract_token(headers: &HeaderMap, query: Option<&str>, cookie_name: &str) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if header.len() > 7 && header[..7].eq_ignore_ascii_case("bearer ") {
            let token = header[7..].trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" && !value.is_empty() {
                return Some(value.into_owned());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
}

/// Verified session of the calling user.
///
/// Use as an axum extractor in route handlers; rejects with a uniform
/// 401 `no_session` when no carrier holds a valid, unexpired token.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionPayload);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(
            &parts.headers,
            parts.uri.query(),
            &state.config.session.cookie,
        )
        .ok_or_else(|| ApiError::unauthorized("no_session"))?;

        let session = state
            .tokens
            .verify_session(&token)
            .ok_or_else(|| ApiError::unauthorized("no_session"))?;
        Ok(Self(session))
    }
}

/// Whether a bot ingest request is authorized. When no ingest token is
/// configured, pushes are accepted unauthenticated.
pub fn ingest_authorized(headers: &HeaderMap, expected: &str) -> bool {
    let expected = expected.trim();
    if expected.is_empty() {
        return true;
    }
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(header) if header.len() > 7 && header[..7].eq_ignore_ascii_case("bearer ") => {
            header[7..].trim() == expected
        }
        _ => {
            warn!("Ingest push rejected: missing or malformed bearer token");
            false
        }
    }
}
