use genrelay_types::{FinishReason, usage_metadata_to_alt_usage};
use serde_json::{Value, json};

/// Translate one complete (non-streaming) native generateContent response
/// into an alt-chat completion body.
pub fn translate_chat_response(model: &str, native: &[u8]) -> Result<Vec<u8>, genrelay_core::error::GatewayError> {
    let parsed: Value = serde_json::from_slice(native)?;

    if let Some(block_reason) = parsed.get("promptFeedback").and_then(|f| f.get("blockReason")).and_then(|b| b.as_str()) {
        let choice = json!({
            "index": 0,
            "message": {"role": "assistant", "content": null},
            "finish_reason": "content_filter",
        });
        let body = json!({
            "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            "object": "chat.completion",
            "model": model,
            "choices": [choice],
            "usage": empty_usage(),
            "_blocked_reason": block_reason,
        });
        return Ok(serde_json::to_vec(&body)?);
    }

    let candidates = parsed.get("candidates").and_then(|c| c.as_array()).cloned().unwrap_or_default();
    let choices: Vec<Value> = candidates.iter().map(|c| candidate_to_choice(c)).collect();
    let usage = parsed.get("usageMetadata").map(usage_metadata_to_alt_usage).unwrap_or_else(empty_usage);

    let body = json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": choices,
        "usage": usage,
    });

    Ok(serde_json::to_vec(&body)?)
}

fn candidate_to_choice(candidate: &Value) -> Value {
    let index = candidate.get("index").and_then(|i| i.as_i64()).unwrap_or(0);
    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .cloned()
        .unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in &parts {
        if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(t);
        }
        if let Some(fc) = part.get("functionCall") {
            let name = fc.get("name").and_then(|n| n.as_str()).unwrap_or("");
            let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
            tool_calls.push(json!({
                "id": format!("call_{}", uuid::Uuid::new_v4()),
                "type": "function",
                "function": {"name": name, "arguments": serde_json::to_string(&args).unwrap_or_default()},
            }));
        }
    }

    let has_function_call = !tool_calls.is_empty();
    let raw_reason = candidate.get("finishReason").and_then(|f| f.as_str());
    let finish_reason = FinishReason::from_native(raw_reason, has_function_call);

    let mut message = json!({"role": "assistant"});
    message["content"] = if text.is_empty() && has_function_call { Value::Null } else { json!(text) };
    if has_function_call {
        message["tool_calls"] = json!(tool_calls);
    }

    json!({
        "index": index,
        "message": message,
        "finish_reason": finish_reason.as_str(),
    })
}

fn empty_usage() -> Value {
    json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
}

/// Translate a native embedContent response into an alt-embeddings entry.
pub fn translate_embed_response(index: usize, native: &[u8]) -> Result<Value, genrelay_core::error::GatewayError> {
    let parsed: Value = serde_json::from_slice(native)?;
    let values = parsed
        .get("embedding")
        .and_then(|e| e.get("values"))
        .cloned()
        .unwrap_or_else(|| json!([]));
    Ok(json!({"object": "embedding", "index": index, "embedding": values}))
}

pub fn wrap_embeddings(model: &str, entries: Vec<Value>, total_prompt_tokens: i64) -> Result<Vec<u8>, genrelay_core::error::GatewayError> {
    let body = json!({
        "object": "list",
        "data": entries,
        "model": model,
        "usage": {"prompt_tokens": total_prompt_tokens, "total_tokens": total_prompt_tokens},
    });
    Ok(serde_json::to_vec(&body)?)
}

/// Translate a native image response (either `:predict` Imagen output or
/// `generateContent` with inline image parts) into an alt images-generations body.
pub fn translate_image_response(native: &[u8]) -> Result<Vec<u8>, genrelay_core::error::GatewayError> {
    let parsed: Value = serde_json::from_slice(native)?;
    let mut images = Vec::new();

    if let Some(predictions) = parsed.get("predictions").and_then(|p| p.as_array()) {
        for pred in predictions {
            if let Some(b64) = pred.get("bytesBase64Encoded").and_then(|v| v.as_str()) {
                images.push(json!({"b64_json": b64}));
            }
        }
    } else if let Some(candidates) = parsed.get("candidates").and_then(|c| c.as_array()) {
        for candidate in candidates {
            let parts = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array());
            let Some(parts) = parts else { continue };

            let mut revised_prompt = String::new();
            let mut inline_images = Vec::new();
            for part in parts {
                if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                    revised_prompt.push_str(t);
                }
                if let Some(data) = part.get("inlineData").and_then(|d| d.get("data")).and_then(|d| d.as_str()) {
                    inline_images.push(data);
                }
            }
            for data in inline_images {
                let mut entry = json!({"b64_json": data});
                if !revised_prompt.is_empty() {
                    entry["revised_prompt"] = json!(revised_prompt);
                }
                images.push(entry);
            }
        }
    }

    let mut body = json!({
        "created": chrono::Utc::now().timestamp(),
        "data": images,
    });
    if let Some(usage) = parsed.get("usageMetadata") {
        body["usage"] = usage_metadata_to_alt_usage(usage);
    }
    Ok(serde_json::to_vec(&body)?)
}
