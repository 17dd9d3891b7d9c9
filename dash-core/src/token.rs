//! Signed, expiring, self-contained tokens.
//!
//! Wire format: `base64url(payload JSON) "." base64url(HMAC-SHA256 signature)`,
//! both segments unpadded. There is no version byte and no algorithm
//! negotiation; the scheme is fixed for the lifetime of the secret. Tokens
//! are never stored server-side, so a leaked token stays valid until its
//! embedded expiry elapses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// JSON key holding the absolute expiry (epoch milliseconds). Injected on
/// issue, required on verify.
pub const EXPIRES_AT_KEY: &str = "expiresAt";

/// Errors that can occur when issuing or verifying tokens
#[derive(Debug, Error)]
pub enum TokenError {
    /// The payload could not be serialized to a JSON object. Fatal for the
    /// request that produced it, never retried.
    #[error("payload cannot be encoded: {0}")]
    Encoding(String),
    /// Malformed, tampered or expired token. Callers treat this uniformly
    /// as an absent credential.
    #[error("invalid token")]
    Invalid,
}

/// Issues and verifies signed tokens with an injected secret.
///
/// The secret is passed in explicitly rather than read from ambient
/// process state, so tests can use throwaway keys and the server decides
/// the failure policy when configuration is missing.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for `payload` expiring `ttl` from now.
    ///
    /// The payload must serialize to a JSON object; an `expiresAt` field
    /// (epoch milliseconds) is inserted, overwriting any caller-supplied
    /// value. Serialization is deterministic (sorted keys), so the signed
    /// bytes are stable for a given payload and expiry.
    pub fn issue<T: Serialize>(&self, payload: &T, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(payload, ttl, Utc::now())
    }

    /// Like [`issue`](Self::issue) with an explicit clock.
    pub fn issue_at<T: Serialize>(
        &self,
        payload: &T,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let mut value =
            serde_json::to_value(payload).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let Value::Object(ref mut map) = value else {
            return Err(TokenError::Encoding(
                "token payload must be a JSON object".to_string(),
            ));
        };
        map.insert(
            EXPIRES_AT_KEY.to_string(),
            Value::from((now + ttl).timestamp_millis()),
        );

        let bytes = serde_json::to_vec(&value).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let data = URL_SAFE_NO_PAD.encode(&bytes);
        let sig = URL_SAFE_NO_PAD.encode(self.sign(&bytes));
        Ok(format!("{data}.{sig}"))
    }

    /// Verify a token and return its payload.
    ///
    /// Fails with [`TokenError::Invalid`] when the token does not split
    /// into exactly two non-empty segments, either segment is not valid
    /// base64url, the payload is not a JSON object, the signature does not
    /// match, or `expiresAt` is missing or elapsed. The signature check is
    /// constant-time. Expiry is strict: a token is still accepted at
    /// exactly `now == expiresAt` and rejected at `now > expiresAt`.
    pub fn verify(&self, token: &str) -> Result<Value, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Like [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Value, TokenError> {
        let mut parts = token.split('.');
        let (Some(data), Some(sig), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TokenError::Invalid);
        };
        if data.is_empty() || sig.is_empty() {
            return Err(TokenError::Invalid);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|_| TokenError::Invalid)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| TokenError::Invalid)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| TokenError::Invalid)?;

        let value: Value = serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;
        if !value.is_object() {
            return Err(TokenError::Invalid);
        }
        let expires_at = value
            .get(EXPIRES_AT_KEY)
            .and_then(Value::as_i64)
            .ok_or(TokenError::Invalid)?;
        if now.timestamp_millis() > expires_at {
            return Err(TokenError::Invalid);
        }
        Ok(value)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
