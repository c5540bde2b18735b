use crate::AppState;
use crate::dispatch::with_credential;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use genrelay_core::error::GatewayError;
use genrelay_provider::NativeRequest;
use genrelay_translator::{request, response};
use serde_json::Value;

pub async fn generate_image(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
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
    let model = parsed.get("model").and_then(|m| m.as_str()).unwrap_or("imagen-3.0-generate").to_string();

    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;
    let native_payload = request::translate_image_request(&model, &body)?;

    let model_for_call = model.clone();
    let store = state.store.as_ref();
    let metrics = state.metrics.as_ref();
    let native_response = with_credential(store, metrics, &auth, &model, |cred| {
        let upstream = state.upstream.clone();
        let req = NativeRequest { model: model_for_call.clone(), payload: Bytes::from(native_payload.clone()) };
        async move { upstream.generate_image(&cred, req).await }
    })
    .await?;

    let alt_body = response::translate_image_response(&native_response.payload)?;
    Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], alt_body).into_response())
}
