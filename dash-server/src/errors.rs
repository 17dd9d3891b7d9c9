use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;

/// Error returned at the HTTP boundary.
///
/// Serialized as `{"ok": false, "error": <code>}` so the dashboard
/// frontend can branch on the short error code.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub error: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with an error code and status code
    pub fn new<S: ToString>(error: S, status_code: StatusCode) -> Self {
        Self {
            error: error.to_string(),
            status_code,
        }
    }

    /// Create a new Unauthorized (401) error. Invalid and expired
    /// credentials both land here: the caller should re-authenticate.
    pub fn unauthorized<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::UNAUTHORIZED)
    }

    /// Create a new Forbidden (403) error
    pub fn forbidden<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::FORBIDDEN)
    }

    /// Create a new Bad Request (400) error
    pub fn bad_request<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::BAD_REQUEST)
    }

    /// Create a new Internal Server Error (500)
    pub fn internal<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create a new Bad Gateway (502) error, for collaborator failures
    pub fn bad_gateway<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::BAD_GATEWAY)
    }

    /// Create a new Service Unavailable (503) error, for missing
    /// configuration. Never leaks the missing value itself.
    pub fn service_unavailable<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::SERVICE_UNAVAILABLE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "ok": false,
            "error": self.error,
        });
        (status_code, Json(body)).into_response()
    }
}
