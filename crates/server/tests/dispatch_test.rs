use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use genrelay_core::config::Config;
use genrelay_core::error::GatewayError;
use genrelay_core::metrics::Metrics;
use genrelay_core::store::{ConfigStore, Credential as StoredCredential, InMemoryConfigStore};
use genrelay_provider::{Credential, ModelInfo, NativeRequest, NativeResponse, StreamChunk, StreamResult, UpstreamClient};
use genrelay_server::AppState;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// A scripted upstream: fails for a configured set of credential ids, then
/// succeeds with a canned native response. Lets tests drive pool-exhaustion
/// and fallback-routing scenarios without a real network call.
struct ScriptedUpstream {
    fail_ids: Vec<String>,
    call_count: AtomicUsize,
}

impl ScriptedUpstream {
    fn new(fail_ids: Vec<&str>) -> Self {
        Self { fail_ids: fail_ids.into_iter().map(str::to_string).collect(), call_count: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn generate(&self, cred: &Credential, _req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.fail_ids.contains(&cred.id) {
            return Err(GatewayError::UpstreamTransient { status: 500, body: "{\"error\":\"overloaded\"}".to_string(), retry_after_secs: None });
        }
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": format!("hello from {}", cred.id)}]}, "finishReason": "STOP", "index": 0}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 3, "totalTokenCount": 5},
        });
        Ok(NativeResponse { payload: Bytes::from(serde_json::to_vec(&body).unwrap()) })
    }

    async fn stream_generate(&self, _cred: &Credential, _req: NativeRequest) -> Result<StreamResult, GatewayError> {
        let chunks = vec![
            Ok(StreamChunk { data: r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"hi"}]}}]}"#.to_string() }),
            Ok(StreamChunk {
                data: r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":1,"candidatesTokenCount":1,"totalTokenCount":2}}"#.to_string(),
            }),
        ];
        Ok(StreamResult { stream: Box::pin(futures::stream::iter(chunks)) })
    }

    async fn embed(&self, _cred: &Credential, _req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        let body = json!({"embedding": {"values": [0.1, 0.2, 0.3]}});
        Ok(NativeResponse { payload: Bytes::from(serde_json::to_vec(&body).unwrap()) })
    }

    async fn count_tokens(&self, _cred: &Credential, _req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        Ok(NativeResponse { payload: Bytes::from(serde_json::to_vec(&json!({"totalTokens": 7})).unwrap()) })
    }

    async fn list_models(&self, _cred: &Credential) -> Result<Vec<ModelInfo>, GatewayError> {
        Ok(vec![ModelInfo { id: "gemini-x".to_string(), display_name: "Gemini X".to_string() }])
    }

    async fn get_model(&self, _cred: &Credential, model: &str) -> Result<ModelInfo, GatewayError> {
        Ok(ModelInfo { id: model.to_string(), display_name: model.to_string() })
    }

    async fn generate_image(&self, _cred: &Credential, _req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        Ok(NativeResponse { payload: Bytes::from(serde_json::to_vec(&json!({"predictions": [{"bytesBase64Encoded": "QUJD"}]})).unwrap()) })
    }
}

async fn build_state(upstream: ScriptedUpstream) -> (AppState, Arc<InMemoryConfigStore>) {
    let store = Arc::new(InMemoryConfigStore::new());
    store.set_trigger_key(Some("trigger-key".to_string())).await;
    store
        .add_primary_entries(vec![
            StoredCredential { id: "pool-0".to_string(), key: "k0".to_string() },
            StoredCredential { id: "pool-1".to_string(), key: "k1".to_string() },
        ])
        .await;

    let state = AppState {
        config: Arc::new(ArcSwap::from_pointee(Config::default())),
        store: store.clone(),
        upstream: Arc::new(upstream),
        metrics: Arc::new(Metrics::new()),
        http_client: reqwest::Client::new(),
    };
    (state, store)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/chat/completions")
        .header("content-type", "application/json")
        .header("authorization", "Bearer trigger-key")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn non_streaming_chat_happy_path() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec![])).await;
    let router = genrelay_server::build_router(state);

    let req = chat_request(json!({"model": "gemini-x", "messages": [{"role": "user", "content": "hi"}]}));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["choices"][0]["message"]["content"].as_str().unwrap().starts_with("hello from"));
    assert_eq!(body["usage"]["total_tokens"], 5);
}

#[tokio::test]
async fn retry_skips_failing_credential_and_succeeds_on_next() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec!["pool-0"])).await;
    let router = genrelay_server::build_router(state);

    let req = chat_request(json!({"model": "gemini-x", "messages": [{"role": "user", "content": "hi"}]}));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "hello from pool-1");
}

#[tokio::test]
async fn pool_exhaustion_surfaces_service_unavailable() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec!["pool-0", "pool-1"])).await;
    let router = genrelay_server::build_router(state);

    let req = chat_request(json!({"model": "gemini-x", "messages": [{"role": "user", "content": "hi"}]}));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn fallback_model_routes_around_the_pool() {
    let (state, store) = build_state(ScriptedUpstream::new(vec!["pool-0", "pool-1"])).await;
    store.set_fallback_key(Some("fallback-secret".to_string())).await;
    store.set_fallback_model_set(vec!["gemini-pro-preview".to_string()]).await;
    let router = genrelay_server::build_router(state);

    let req = chat_request(json!({"model": "gemini-pro-preview", "messages": [{"role": "user", "content": "hi"}]}));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "hello from fallback");
}

#[tokio::test]
async fn unrecognized_credential_uses_passthrough_mode() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec![])).await;
    let router = genrelay_server::build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/chat/completions")
        .header("content-type", "application/json")
        .header("authorization", "Bearer some-users-own-key")
        .body(Body::from(serde_json::to_vec(&json!({"model": "gemini-x", "messages": [{"role": "user", "content": "hi"}]})).unwrap()))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "hello from passthrough");
}

#[tokio::test]
async fn streaming_chat_emits_prelude_deltas_usage_and_done() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec![])).await;
    let router = genrelay_server::build_router(state);

    let req = chat_request(json!({"model": "gemini-x", "stream": true, "messages": [{"role": "user", "content": "hi"}]}));
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "text/event-stream");

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("\"role\":\"assistant\""));
    assert!(text.contains("\"content\":\"hi\""));
    assert!(text.contains("\"finish_reason\":\"stop\""));
    assert!(text.contains("\"usage\""));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

#[tokio::test]
async fn missing_credentials_are_rejected_before_dispatch() {
    let (state, _store) = build_state(ScriptedUpstream::new(vec![])).await;
    let router = genrelay_server::build_router(state);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({"model": "gemini-x", "messages": []})).unwrap()))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
