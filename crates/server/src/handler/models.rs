use crate::AppState;
use crate::dispatch::with_credential;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use genrelay_core::error::GatewayError;
use serde_json::json;

pub async fn list_models_alt(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.metrics.record_request();
    match handle(&state, &headers).await {
        Ok(resp) => resp,
        Err(e) => {
            state.metrics.record_error();
            e.into_response()
        }
    }
}

async fn handle(state: &AppState, headers: &HeaderMap) -> Result<Response, GatewayError> {
    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;
    let store = state.store.as_ref();
    let metrics = state.metrics.as_ref();

    let models = with_credential(store, metrics, &auth, "models", |cred| {
        let upstream = state.upstream.clone();
        async move { upstream.list_models(&cred).await }
    })
    .await?;

    let data: Vec<_> = models
        .into_iter()
        .map(|m| json!({"id": m.id, "object": "model", "owned_by": "upstream"}))
        .collect();

    Ok(axum::Json(json!({"object": "list", "data": data})).into_response())
}
