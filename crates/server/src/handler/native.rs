use crate::AppState;
use crate::dispatch::with_credential;
use crate::streaming::build_sse_response;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use genrelay_core::error::GatewayError;
use genrelay_provider::{NativeRequest, StreamChunk};
use genrelay_translator::classifier::{Classification, NativeAction, classify};
use genrelay_translator::{narrow_imagen_request, normalize_native_request, validate_gemini_image_request};
use serde_json::json;
use std::pin::Pin;

pub async fn list_models_native(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.metrics.record_request();
    match list_models(&state, &headers).await {
        Ok(resp) => resp,
        Err(e) => {
            state.metrics.record_error();
            e.into_response()
        }
    }
}

async fn list_models(state: &AppState, headers: &HeaderMap) -> Result<Response, GatewayError> {
    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;
    let store = state.store.as_ref();
    let metrics = state.metrics.as_ref();
    let models = with_credential(store, metrics, &auth, "models", |cred| {
        let upstream = state.upstream.clone();
        async move { upstream.list_models(&cred).await }
    })
    .await?;

    let data: Vec<_> = models.into_iter().map(|m| json!({"name": format!("models/{}", m.id), "displayName": m.display_name})).collect();
    Ok(axum::Json(json!({"models": data})).into_response())
}

pub async fn native_action(State(state): State<AppState>, method: Method, OriginalUri(uri): OriginalUri, headers: HeaderMap, body: Bytes) -> Response {
    state.metrics.record_request();
    match handle(&state, &method, uri.path(), &headers, body).await {
        Ok(resp) => resp,
        Err(e) => {
            state.metrics.record_error();
            e.into_response()
        }
    }
}

async fn handle(state: &AppState, method: &Method, request_path: &str, headers: &HeaderMap, body: Bytes) -> Result<Response, GatewayError> {
    let path = request_path.strip_prefix("/api").unwrap_or(request_path);
    let classification = classify(method.as_str(), path);

    let Classification::Native { action, model } = classification else {
        return Err(GatewayError::ClientMalformed(format!("unrecognized native route: {method} {path}")));
    };

    let auth = crate::auth::authenticate(headers, state.store.as_ref()).await?;

    match action {
        NativeAction::GetModel => {
            let store = state.store.as_ref();
            let metrics = state.metrics.as_ref();
            let info = with_credential(store, metrics, &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let model = model.clone();
                async move { upstream.get_model(&cred, &model).await }
            })
            .await?;
            Ok(axum::Json(json!({"name": format!("models/{}", info.id), "displayName": info.display_name})).into_response())
        }
        NativeAction::ListModels => list_models(state, headers).await,
        NativeAction::GenerateContent => {
            let payload = normalize_native_request(&body)?;
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: Bytes::from(payload.clone()) };
                async move { upstream.generate(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
        NativeAction::StreamGenerateContent => {
            let payload = normalize_native_request(&body)?;
            let stream_result = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: Bytes::from(payload.clone()) };
                async move { upstream.stream_generate(&cred, req).await }
            })
            .await?;
            let native_stream: Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>> = stream_result.stream;
            // Native callers get the upstream's own SSE framing passed straight through.
            let passthrough = futures::StreamExt::map(native_stream, |r| r.map(|c| format!("data: {}\n\n", c.data)));
            Ok(build_sse_response(Box::pin(passthrough)))
        }
        NativeAction::EmbedContent => {
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: body.clone() };
                async move { upstream.embed(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
        NativeAction::BatchEmbedContents => {
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: body.clone() };
                async move { upstream.embed(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
        NativeAction::CountTokens => {
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: body.clone() };
                async move { upstream.count_tokens(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
        NativeAction::GenerateImageWithGemini => {
            validate_gemini_image_request(&body)?;
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: body.clone() };
                async move { upstream.generate_image(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
        NativeAction::GenerateImageWithImagen => {
            let payload = narrow_imagen_request(&body)?;
            let response = with_credential(state.store.as_ref(), state.metrics.as_ref(), &auth, &model, |cred| {
                let upstream = state.upstream.clone();
                let req = NativeRequest { model: model.clone(), payload: Bytes::from(payload.clone()) };
                async move { upstream.generate_image(&cred, req).await }
            })
            .await?;
            Ok((axum::http::StatusCode::OK, [("content-type", "application/json")], response.payload.to_vec()).into_response())
        }
    }
}
