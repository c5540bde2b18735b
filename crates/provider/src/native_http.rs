use crate::client::{Credential, ModelInfo, NativeRequest, NativeResponse, StreamChunk, StreamResult, UpstreamClient};
use crate::common::{build_http_client, handle_response};
use crate::sse::parse_sse_stream;
use async_trait::async_trait;
use genrelay_core::error::GatewayError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Talks to the provider's own REST surface directly — this is the one
/// concrete [`UpstreamClient`] the gateway ships with.
pub struct NativeHttpClient {
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
}

impl NativeHttpClient {
    pub fn new(connect_timeout_secs: u64, request_timeout_secs: u64) -> Self {
        Self { connect_timeout_secs, request_timeout_secs }
    }

    fn base_url(&self, cred: &Credential) -> String {
        cred.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string()
    }

    fn client(&self) -> Result<reqwest::Client, GatewayError> {
        build_http_client(self.connect_timeout_secs, self.request_timeout_secs)
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        cred: &Credential,
        url: &str,
        payload: bytes::Bytes,
    ) -> reqwest::RequestBuilder {
        client
            .post(url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &cred.api_key)
            .body(payload)
    }
}

#[async_trait]
impl UpstreamClient for NativeHttpClient {
    async fn generate(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        let client = self.client()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url(cred), req.model);
        let resp = self.build_request(&client, cred, &url, req.payload).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        Ok(NativeResponse { payload: body })
    }

    async fn stream_generate(&self, cred: &Credential, req: NativeRequest) -> Result<StreamResult, GatewayError> {
        let client = self.client()?;
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url(cred),
            req.model
        );
        let resp = self.build_request(&client, cred, &url, req.payload).send().await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.bytes().await?;
            return Err(GatewayError::UpstreamTransient {
                status,
                body: String::from_utf8_lossy(&body).to_string(),
                retry_after_secs: None,
            });
        }

        let byte_stream = resp.bytes_stream();
        let sse_stream = parse_sse_stream(byte_stream);
        let chunk_stream = tokio_stream::StreamExt::map(sse_stream, |result| {
            result.map(|event| StreamChunk { data: event.data })
        });

        Ok(StreamResult { stream: Box::pin(chunk_stream) })
    }

    async fn embed(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        let client = self.client()?;
        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url(cred), req.model);
        let resp = self.build_request(&client, cred, &url, req.payload).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        Ok(NativeResponse { payload: body })
    }

    async fn count_tokens(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        let client = self.client()?;
        let url = format!("{}/v1beta/models/{}:countTokens", self.base_url(cred), req.model);
        let resp = self.build_request(&client, cred, &url, req.payload).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        Ok(NativeResponse { payload: body })
    }

    async fn get_model(&self, cred: &Credential, model: &str) -> Result<ModelInfo, GatewayError> {
        let client = self.client()?;
        let url = format!("{}/v1beta/models/{}", self.base_url(cred), model);
        let resp = client.get(&url).header("x-goog-api-key", &cred.api_key).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)?;
        let name = parsed.get("name").and_then(|n| n.as_str()).unwrap_or(model);
        let id = name.strip_prefix("models/").unwrap_or(name).to_string();
        let display_name = parsed.get("displayName").and_then(|d| d.as_str()).unwrap_or(&id).to_string();
        Ok(ModelInfo { id, display_name })
    }

    async fn list_models(&self, cred: &Credential) -> Result<Vec<ModelInfo>, GatewayError> {
        let client = self.client()?;
        let url = format!("{}/v1beta/models", self.base_url(cred));
        let resp = client.get(&url).header("x-goog-api-key", &cred.api_key).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body)?;
        let models = parsed
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let name = m.get("name").and_then(|n| n.as_str())?;
                        let id = name.strip_prefix("models/").unwrap_or(name).to_string();
                        let display_name = m.get("displayName").and_then(|d| d.as_str()).unwrap_or(&id).to_string();
                        Some(ModelInfo { id, display_name })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn generate_image(&self, cred: &Credential, req: NativeRequest) -> Result<NativeResponse, GatewayError> {
        // Imagen-family models use a dedicated endpoint; anything else goes through
        // plain generateContent with responseModalities:[IMAGE] already set by the caller.
        let client = self.client()?;
        let action = if req.model.to_lowercase().contains("imagen") {
            "predict"
        } else {
            "generateContent"
        };
        let url = format!("{}/v1beta/models/{}:{}", self.base_url(cred), req.model, action);
        let resp = self.build_request(&client, cred, &url, req.payload).send().await?;
        let (body, _headers) = handle_response(resp).await?;
        Ok(NativeResponse { payload: body })
    }
}
