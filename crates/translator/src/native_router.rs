use genrelay_core::error::GatewayError;
use genrelay_types::EffectiveConfig;
use serde_json::{Map, Value, json};

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

const ALIAS_KEYS: &[&str] = &[
    "temperature",
    "topP",
    "topK",
    "candidateCount",
    "maxOutputTokens",
    "stopSequences",
    "responseMimeType",
    "responseSchema",
    "responseModalities",
    "systemInstruction",
];

/// Normalize a client-supplied native request body before it reaches the
/// upstream: merge `body.config` (lowest priority), `body.generationConfig`,
/// then the handful of top-level aliases the native API also accepts, into a
/// single `generationConfig`, and unconditionally force `safetySettings` off.
///
/// `thinkingConfig` only appears in the output when one of the merged
/// sources actually set a `thinkingBudget` — the gateway never invents one.
pub fn normalize_native_request(raw: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let mut body: Value = serde_json::from_slice(raw)?;
    let obj = body.as_object_mut().ok_or_else(|| GatewayError::ClientMalformed("request body must be a JSON object".to_string()))?;

    let body_config = obj.remove("config").unwrap_or_else(|| json!({}));
    let generation_config = obj.get("generationConfig").cloned().unwrap_or_else(|| json!({}));

    let mut aliases = Map::new();
    for key in ALIAS_KEYS {
        if let Some(v) = obj.remove(*key) {
            aliases.insert(key.to_string(), v);
        }
    }
    if let Some(thinking_budget) = obj.remove("thinkingConfig").and_then(|tc| tc.get("thinkingBudget").cloned()) {
        aliases.insert("thinkingBudget".to_string(), thinking_budget);
    }

    let merged = EffectiveConfig::merge(&[&body_config, &generation_config, &Value::Object(aliases)]);
    let mut rendered = merged.to_generation_config_json();
    let rendered_obj = rendered.as_object_mut().expect("object");

    rendered_obj.insert(
        "safetySettings".to_string(),
        Value::Array(SAFETY_CATEGORIES.iter().map(|c| json!({"category": c, "threshold": "BLOCK_NONE"})).collect()),
    );

    if let Some(budget) = merged.thinking_budget {
        rendered_obj.insert("thinkingConfig".to_string(), json!({"thinkingBudget": budget}));
    }

    obj.insert("generationConfig".to_string(), rendered);

    Ok(serde_json::to_vec(&body)?)
}

/// Validate a `generateImageWithGemini` request body: the upstream only
/// returns image data when `responseModalities` explicitly asks for it.
pub fn validate_gemini_image_request(raw: &[u8]) -> Result<(), GatewayError> {
    let body: Value = serde_json::from_slice(raw)?;
    let has_image_modality = body
        .get("generationConfig")
        .and_then(|gc| gc.get("responseModalities"))
        .and_then(|m| m.as_array())
        .is_some_and(|modalities| modalities.iter().any(|m| m.as_str() == Some("IMAGE")));

    if !has_image_modality {
        return Err(GatewayError::ClientMalformed(
            "generateImageWithGemini requires generationConfig.responseModalities to include \"IMAGE\"".to_string(),
        ));
    }
    Ok(())
}

/// Narrow a `generateImageWithImagen` request body to exactly the fields the
/// upstream `:predict` surface accepts, dropping anything else the client sent.
pub fn narrow_imagen_request(raw: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let body: Value = serde_json::from_slice(raw)?;
    let prompt = body.get("prompt").and_then(|p| p.as_str()).ok_or_else(|| GatewayError::ClientMalformed("missing prompt field".to_string()))?;

    let mut narrowed = json!({"prompt": prompt});
    if let Some(config) = body.get("config") {
        let mut config_obj = Map::new();
        if let Some(v) = config.get("numberOfImages") {
            config_obj.insert("numberOfImages".to_string(), v.clone());
        }
        if let Some(v) = config.get("aspectRatio") {
            config_obj.insert("aspectRatio".to_string(), v.clone());
        }
        if let Some(v) = config.get("personGeneration") {
            config_obj.insert("personGeneration".to_string(), v.clone());
        }
        if !config_obj.is_empty() {
            narrowed["config"] = Value::Object(config_obj);
        }
    }

    Ok(serde_json::to_vec(&narrowed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_generation_config_and_aliases_merge_in_priority_order() {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
            "config": {"temperature": 0.1, "topP": 0.9},
            "generationConfig": {"temperature": 0.5},
            "maxOutputTokens": 2048,
        });
        let out = normalize_native_request(&serde_json::to_vec(&body).unwrap()).unwrap();
        let normalized: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(normalized["generationConfig"]["temperature"], 0.5);
        assert_eq!(normalized["generationConfig"]["topP"], 0.9);
        assert_eq!(normalized["generationConfig"]["maxOutputTokens"], 2048);
        assert!(normalized.get("config").is_none());
        assert!(normalized.get("maxOutputTokens").is_none());
    }

    #[test]
    fn safety_settings_always_forced_off() {
        let body = json!({"contents": [], "generationConfig": {"safetySettings": [{"category": "x", "threshold": "BLOCK_HIGH"}]}});
        let out = normalize_native_request(&serde_json::to_vec(&body).unwrap()).unwrap();
        let normalized: Value = serde_json::from_slice(&out).unwrap();
        let settings = normalized["generationConfig"]["safetySettings"].as_array().unwrap();
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn thinking_config_absent_when_no_source_sets_it() {
        let body = json!({"contents": []});
        let out = normalize_native_request(&serde_json::to_vec(&body).unwrap()).unwrap();
        let normalized: Value = serde_json::from_slice(&out).unwrap();
        assert!(normalized["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn top_level_thinking_config_alias_is_merged() {
        let body = json!({"contents": [], "thinkingConfig": {"thinkingBudget": 2048}});
        let out = normalize_native_request(&serde_json::to_vec(&body).unwrap()).unwrap();
        let normalized: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(normalized["generationConfig"]["thinkingConfig"]["thinkingBudget"], 2048);
    }

    #[test]
    fn gemini_image_request_without_image_modality_is_rejected() {
        let body = json!({"contents": [], "generationConfig": {"responseModalities": ["TEXT"]}});
        assert!(validate_gemini_image_request(&serde_json::to_vec(&body).unwrap()).is_err());
    }

    #[test]
    fn gemini_image_request_with_image_modality_is_accepted() {
        let body = json!({"contents": [], "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}});
        assert!(validate_gemini_image_request(&serde_json::to_vec(&body).unwrap()).is_ok());
    }

    #[test]
    fn imagen_request_drops_unspecified_fields() {
        let body = json!({"prompt": "a cat", "config": {"numberOfImages": 2, "unexpectedField": "x"}, "otherTopLevel": true});
        let out = narrow_imagen_request(&serde_json::to_vec(&body).unwrap()).unwrap();
        let narrowed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(narrowed["prompt"], "a cat");
        assert_eq!(narrowed["config"]["numberOfImages"], 2);
        assert!(narrowed["config"].get("unexpectedField").is_none());
        assert!(narrowed.get("otherTopLevel").is_none());
    }
}
