use crate::AppState;
use crate::dispatch::with_credential;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use genrelay_core::error::GatewayError;
use genrelay_provider::NativeRequest;
use genrelay_translator::{request, response};
use serde_json::{Value, json};

pub async fn embeddings(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    state.metrics.record_request();
    match handle(&state, &headers, body).await {
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

    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;
    let per_input = request::translate_embed_requests(&body)?;

    let mut entries = Vec::with_capacity(per_input.len());
    for (index, (_input, native_payload)) in per_input.into_iter().enumerate() {
        let model_for_call = model.clone();
        let store = state.store.as_ref();
        let metrics = state.metrics.as_ref();
        let result = with_credential(store, metrics, &auth, &model, |cred| {
            let upstream = state.upstream.clone();
            let req = NativeRequest { model: model_for_call.clone(), payload: Bytes::from(native_payload.clone()) };
            async move { upstream.embed(&cred, req).await }
        })
        .await;

        let entry = match result {
            Ok(native_response) => response::translate_embed_response(index, &native_response.payload)?,
            Err(e) => json!({"object": "embedding", "index": index, "embedding": [], "error": {"message": e.to_string()}}),
        };
        entries.push(entry);
    }

    let alt_body = response::wrap_embeddings(&model, entries, 0)?;
    Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], alt_body).into_response())
}
