use crate::AppState;
use crate::dispatch::with_credential;
use crate::streaming::build_sse_response;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use genrelay_core::error::GatewayError;
use genrelay_provider::{NativeRequest, StreamChunk};
use genrelay_translator::{request, response, stream};
use serde_json::Value;
use std::pin::Pin;

pub async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    state.metrics.record_request();
    let started = std::time::Instant::now();
    let result = handle(&state, &headers, body).await;
    state.metrics.record_latency_ms(started.elapsed().as_millis() as u64);
    match result {
        Ok(resp) => resp,
        Err(e) => {
            state.metrics.record_error();
            e.into_response()
        }
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: Bytes) -> Result<Response, GatewayError> {
    let parsed: Value = serde_json::from_slice(&body).map_err(|e| GatewayError::ClientMalformed(e.to_string()))?;
    let model = parsed.get("model").and_then(|m| m.as_str()).ok_or_else(|| GatewayError::ClientMalformed("missing model field".to_string()))?.to_string();
    let wants_stream = parsed.get("stream").and_then(|s| s.as_bool()).unwrap_or(false);

    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;
    let native_payload = request::translate_chat_request(&body, &state.http_client).await?;

    if wants_stream {
        let model_for_stream = model.clone();
        let store = state.store.as_ref();
        let metrics = state.metrics.as_ref();
        let stream_result = with_credential(store, metrics, &auth, &model, |cred| {
            let upstream = state.upstream.clone();
            let req = NativeRequest { model: model_for_stream.clone(), payload: Bytes::from(native_payload.clone()) };
            async move { upstream.stream_generate(&cred, req).await }
        })
        .await?;

        let native_stream: Pin<Box<dyn futures::Stream<Item = Result<StreamChunk, GatewayError>> + Send>> = stream_result.stream;
        let alt_stream = stream::transform_to_alt_sse(model, true, native_stream);
        Ok(build_sse_response(alt_stream))
    } else {
        let model_for_call = model.clone();
        let store = state.store.as_ref();
        let metrics = state.metrics.as_ref();
        let native_response = with_credential(store, metrics, &auth, &model, |cred| {
            let upstream = state.upstream.clone();
            let req = NativeRequest { model: model_for_call.clone(), payload: Bytes::from(native_payload.clone()) };
            async move { upstream.generate(&cred, req).await }
        })
        .await?;

        let alt_body = response::translate_chat_response(&model, &native_response.payload)?;
        Ok((
            axum::http::StatusCode::OK,
            [("content-type", "application/json")],
            alt_body,
        )
            .into_response())
    }
}
