use axum::http::HeaderMap;
use genrelay_core::error::GatewayError;
use genrelay_core::store::ConfigStore;

/// Which credential mode a request should use once authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// The caller presented the gateway's own trigger key: use the pooled
    /// credentials and rotation/fallback machinery.
    Pool,
    /// The caller presented something else: treat it as their own upstream
    /// credential and pass it straight through, untouched by the pool.
    Passthrough { credential: String },
}

/// Extract a bearer-style credential from either the native `x-goog-api-key`
/// header or an alt `Authorization: Bearer ...` header.
fn extract_presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    if let Some(v) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(rest) = v.strip_prefix("Bearer ") {
            return Some(rest.to_string());
        }
        return Some(v.to_string());
    }
    None
}

/// Decide whether a request should use the pool or passthrough, based on
/// whether the presented key matches the configured trigger key. Requests
/// with no credential at all are rejected.
pub async fn authenticate(headers: &HeaderMap, store: &dyn ConfigStore) -> Result<AuthMode, GatewayError> {
    let presented = extract_presented_key(headers)
        .ok_or_else(|| GatewayError::Unauthorized("missing credentials".to_string()))?;

    if store.is_valid_trigger_key(&presented).await {
        Ok(AuthMode::Pool)
    } else {
        Ok(AuthMode::Passthrough { credential: presented })
    }
}
