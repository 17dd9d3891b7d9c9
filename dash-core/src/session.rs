//! State and session token helpers built on [`TokenCodec`].
//!
//! Two token kinds share the codec: short-lived CSRF "state" tokens that
//! carry the post-login return path across the OAuth redirect, and
//! longer-lived session tokens that carry the authenticated identity and
//! an optional upstream bearer credential. Verification failures collapse
//! to `None` so callers have a single "not authenticated" branch instead
//! of a taxonomy of codec errors.

use crate::token::{TokenCodec, TokenError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lower clamp for the session TTL (1 hour).
pub const SESSION_TTL_MIN_SECS: i64 = 3600;
/// Upper clamp for the session TTL (7 days).
pub const SESSION_TTL_MAX_SECS: i64 = 7 * 24 * 3600;

/// CSRF state carried through the OAuth redirect dance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatePayload {
    /// Issue timestamp, epoch milliseconds
    #[serde(rename = "issuedAt")]
    pub issued_at: i64,
    /// Where to send the caller after login. Always starts with `/`.
    #[serde(rename = "returnPath")]
    pub return_path: String,
}

/// Identity fields copied verbatim from the identity provider at login.
/// There is no live refresh: the session shows whatever the provider
/// returned at issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionIdentity {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    #[serde(rename = "avatarRef")]
    pub avatar_ref: Option<String>,
}

/// Authenticated session, carried entirely by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    #[serde(rename = "avatarRef")]
    pub avatar_ref: Option<String>,
    /// Bearer credential for the upstream identity API, embedded so later
    /// requests can re-query live data without server-side storage.
    #[serde(
        rename = "upstreamCredential",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub upstream_credential: Option<String>,
    #[serde(rename = "issuedAt")]
    pub issued_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Token factory/verifier with configured TTLs for both token kinds.
#[derive(Clone)]
pub struct Tokens {
    codec: TokenCodec,
    state_ttl: Duration,
    session_ttl: Duration,
}

impl Tokens {
    /// `session_ttl` is clamped into
    /// [`SESSION_TTL_MIN_SECS`, `SESSION_TTL_MAX_SECS`].
    pub fn new(codec: TokenCodec, state_ttl: Duration, session_ttl: Duration) -> Self {
        let session_ttl = session_ttl
            .max(Duration::seconds(SESSION_TTL_MIN_SECS))
            .min(Duration::seconds(SESSION_TTL_MAX_SECS));
        Self {
            codec,
            state_ttl,
            session_ttl,
        }
    }

    /// Issue a state token binding the OAuth redirect to `return_path`.
    /// Paths not starting with `/` are coerced to `/` rather than rejected.
    pub fn issue_state(&self, return_path: &str) -> Result<String, TokenError> {
        self.issue_state_at(return_path, Utc::now())
    }

    pub fn issue_state_at(
        &self,
        return_path: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let payload = StatePayload {
            issued_at: now.timestamp_millis(),
            return_path: normalize_return_path(return_path),
        };
        self.codec.issue_at(&payload, self.state_ttl, now)
    }

    /// Parse a state token; any failure (malformed, tampered, expired)
    /// yields `None`. The return path is re-normalized defensively even
    /// though it was normalized at issuance.
    pub fn parse_state(&self, token: &str) -> Option<StatePayload> {
        self.parse_state_at(token, Utc::now())
    }

    pub fn parse_state_at(&self, token: &str, now: DateTime<Utc>) -> Option<StatePayload> {
        let value = self.codec.verify_at(token, now).ok()?;
        let mut state: StatePayload = serde_json::from_value(value).ok()?;
        state.return_path = normalize_return_path(&state.return_path);
        Some(state)
    }

    /// Issue a session token for an authenticated identity, optionally
    /// embedding the upstream bearer credential.
    pub fn issue_session(
        &self,
        identity: SessionIdentity,
        upstream_credential: Option<String>,
    ) -> Result<String, TokenError> {
        self.issue_session_at(identity, upstream_credential, Utc::now())
    }

    pub fn issue_session_at(
        &self,
        identity: SessionIdentity,
        upstream_credential: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let payload = SessionPayload {
            user_id: identity.user_id,
            username: identity.username,
            avatar_ref: identity.avatar_ref,
            upstream_credential,
            issued_at: now.timestamp_millis(),
            expires_at: (now + self.session_ttl).timestamp_millis(),
        };
        self.codec.issue_at(&payload, self.session_ttl, now)
    }

    /// Verify a session token; `None` on any failure so callers treat
    /// every bad credential the same way.
    pub fn verify_session(&self, token: &str) -> Option<SessionPayload> {
        self.verify_session_at(token, Utc::now())
    }

    pub fn verify_session_at(&self, token: &str, now: DateTime<Utc>) -> Option<SessionPayload> {
        let value = self.codec.verify_at(token, now).ok()?;
        serde_json::from_value(value).ok()
    }
}

fn normalize_return_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        "/".to_string()
    }
}
