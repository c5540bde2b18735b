use serde_json::Value;

/// The generation-config fields the native request body can carry, merged from
/// up to three sources in increasing priority: `body.config`, `body.generationConfig`,
/// then the handful of top-level alias fields the native API also accepts.
///
/// Modeled as an explicit struct rather than copying properties between dynamic
/// objects, so the merge order is a fixed set of assignments instead of a loop
/// over whatever keys happen to be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveConfig {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<f64>,
    pub candidate_count: Option<i64>,
    pub max_output_tokens: Option<i64>,
    pub stop_sequences: Option<Vec<String>>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
    pub response_modalities: Option<Vec<String>>,
    pub system_instruction: Option<Value>,
    pub thinking_budget: Option<i64>,
}

impl EffectiveConfig {
    /// Merge three optional config sources in ascending priority.
    pub fn merge(sources: &[&Value]) -> Self {
        let mut out = Self::default();
        for source in sources {
            out.apply(source);
        }
        out
    }

    fn apply(&mut self, src: &Value) {
        let Some(obj) = src.as_object() else {
            return;
        };
        if let Some(v) = obj.get("temperature").and_then(Value::as_f64) {
            self.temperature = Some(v);
        }
        if let Some(v) = obj.get("topP").and_then(Value::as_f64) {
            self.top_p = Some(v);
        }
        if let Some(v) = obj.get("topK").and_then(Value::as_f64) {
            self.top_k = Some(v);
        }
        if let Some(v) = obj.get("candidateCount").and_then(Value::as_i64) {
            self.candidate_count = Some(v);
        }
        if let Some(v) = obj.get("maxOutputTokens").and_then(Value::as_i64) {
            self.max_output_tokens = Some(v);
        }
        if let Some(arr) = obj.get("stopSequences").and_then(Value::as_array) {
            self.stop_sequences = Some(
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            );
        }
        if let Some(v) = obj.get("responseMimeType").and_then(Value::as_str) {
            self.response_mime_type = Some(v.to_string());
        }
        if let Some(v) = obj.get("responseSchema") {
            self.response_schema = Some(v.clone());
        }
        if let Some(arr) = obj.get("responseModalities").and_then(Value::as_array) {
            self.response_modalities = Some(
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            );
        }
        if let Some(v) = obj.get("systemInstruction") {
            self.system_instruction = Some(v.clone());
        }
        if let Some(v) = obj.get("thinkingBudget").and_then(Value::as_i64) {
            self.thinking_budget = Some(v);
        }
    }

    /// Render as a `generationConfig` JSON object. Does not include `safetySettings`
    /// or `thinkingConfig` — callers own those policies.
    pub fn to_generation_config_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(v) = self.temperature {
            obj.insert("temperature".into(), v.into());
        }
        if let Some(v) = self.top_p {
            obj.insert("topP".into(), v.into());
        }
        if let Some(v) = self.top_k {
            obj.insert("topK".into(), v.into());
        }
        if let Some(v) = self.candidate_count {
            obj.insert("candidateCount".into(), v.into());
        }
        if let Some(v) = self.max_output_tokens {
            obj.insert("maxOutputTokens".into(), v.into());
        }
        if let Some(ref v) = self.stop_sequences {
            obj.insert("stopSequences".into(), v.clone().into());
        }
        if let Some(ref v) = self.response_mime_type {
            obj.insert("responseMimeType".into(), v.clone().into());
        }
        if let Some(ref v) = self.response_schema {
            obj.insert("responseSchema".into(), v.clone());
        }
        if let Some(ref v) = self.response_modalities {
            obj.insert("responseModalities".into(), v.clone().into());
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_source_overrides_earlier() {
        let body_config = json!({"temperature": 0.1, "topP": 0.9});
        let generation_config = json!({"temperature": 0.5});
        let aliases = json!({"maxOutputTokens": 1024});
        let merged = EffectiveConfig::merge(&[&body_config, &generation_config, &aliases]);
        assert_eq!(merged.temperature, Some(0.5));
        assert_eq!(merged.top_p, Some(0.9));
        assert_eq!(merged.max_output_tokens, Some(1024));
    }

    #[test]
    fn missing_sources_are_ignored() {
        let empty = json!({});
        let merged = EffectiveConfig::merge(&[&empty, &empty, &empty]);
        assert_eq!(merged, EffectiveConfig::default());
    }
}
