use async_trait::async_trait;
use bytes::Bytes;
use genrelay_core::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// A single credential's worth of identity for an upstream call: the bearer
/// key plus whatever base URL override applies to it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// A non-streaming call to the upstream, already translated into native shape.
#[derive(Debug, Clone)]
pub struct NativeRequest {
    pub model: String,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
pub struct NativeResponse {
    pub payload: Bytes,
}

/// A single chunk in a native streaming response.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub data: String,
}

pub struct StreamResult {
    pub stream: Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
}

/// Abstract boundary to the upstream generative-model provider. Everything
/// downstream of request classification talks to the provider only through
/// this trait — no HTTP details leak past it.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn generate(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError>;

    async fn stream_generate(&self, cred: &Credential, req: NativeRequest) -> Result<StreamResult, GatewayError>;

    async fn embed(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError>;

    async fn count_tokens(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError>;

    async fn list_models(&self, cred: &Credential) -> Result<Vec<ModelInfo>, GatewayError>;

    async fn get_model(&self, cred: &Credential, model: &str) -> Result<ModelInfo, GatewayError>;

    async fn generate_image(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError>;
}
