use genrelay_core::error::GatewayError;
use std::collections::HashMap;

/// Extract response headers from a reqwest Response into a HashMap.
pub fn extract_headers(resp: &reqwest::Response) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (key, value) in resp.headers().iter() {
        if let Ok(v) = value.to_str() {
            headers.insert(key.as_str().to_string(), v.to_string());
        }
    }
    headers
}

/// Parse the `Retry-After` header value as seconds. Integer-seconds form only;
/// the HTTP-date form is not handled.
pub fn parse_retry_after(headers: &HashMap<String, String>) -> Option<u64> {
    headers.get("retry-after").and_then(|v| v.parse::<u64>().ok())
}

/// Build an HTTP client with the gateway's default connect/request timeouts.
pub fn build_http_client(connect_timeout_secs: u64, request_timeout_secs: u64) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(connect_timeout_secs))
        .timeout(std::time::Duration::from_secs(request_timeout_secs))
        .user_agent("genrelay/0.1.0")
        .build()
        .map_err(|e| GatewayError::InternalBug(format!("failed to build HTTP client: {e}")))
}

/// Check a non-streaming response's status, returning an error with the body
/// attached for non-2xx so callers can surface it verbatim.
pub async fn handle_response(resp: reqwest::Response) -> Result<(bytes::Bytes, HashMap<String, String>), GatewayError> {
    let status = resp.status().as_u16();
    let headers = extract_headers(&resp);
    let body = resp.bytes().await?;

    if status >= 400 {
        return Err(GatewayError::UpstreamTransient {
            status,
            body: String::from_utf8_lossy(&body).to_string(),
            retry_after_secs: parse_retry_after(&headers),
        });
    }

    Ok((body, headers))
}
