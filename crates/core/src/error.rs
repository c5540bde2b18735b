use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for all gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    ClientMalformed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("upstream error (status {status}): {body}")]
    UpstreamTransient {
        status: u16,
        body: String,
        /// Parsed from the upstream `Retry-After` header (seconds), if present.
        retry_after_secs: Option<u64>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("no available credentials for model {model}")]
    PoolExhausted { model: String, last_upstream_body: Option<String> },

    #[error("translation error: {0}")]
    Translation(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("internal error: {0}")]
    InternalBug(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ClientMalformed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamTransient { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Translation(_) | Self::InternalBug(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Unauthorized(_) => "authentication_error",
            Self::PoolExhausted { .. } => "insufficient_quota",
            Self::ClientMalformed(_) | Self::ModelNotFound(_) => "invalid_request_error",
            Self::UpstreamTransient { .. } => "upstream_error",
            _ => "server_error",
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Self::Unauthorized(_) => "invalid_api_key",
            Self::PoolExhausted { .. } => "insufficient_quota",
            Self::ModelNotFound(_) => "model_not_found",
            Self::ClientMalformed(_) => "invalid_request",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // For upstream errors, pass through the original JSON body verbatim when possible.
        if let Self::UpstreamTransient { body, .. } = &self
            && serde_json::from_str::<serde_json::Value>(body).is_ok()
        {
            return (status, [("content-type", "application/json")], body.clone()).into_response();
        }

        let mut body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
                "code": self.error_code(),
            }
        });
        if let Self::PoolExhausted { last_upstream_body: Some(b), .. } = &self {
            body["error"]["upstream_body"] = serde_json::from_str::<serde_json::Value>(b).unwrap_or_else(|_| json!(b));
        }

        (status, [("content-type", "application/json")], body.to_string()).into_response()
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Translation(format!("JSON error: {e}"))
    }
}
