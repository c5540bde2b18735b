use serde_json::{Value, json};

/// Remap a native `usageMetadata` object into an alt `usage` object.
///
/// `completion_tokens` is `responseTokenCount` (here `candidatesTokenCount`)
/// with any `thoughtsTokenCount` subtracted back out, floored at zero —
/// thinking tokens are billed separately and surfaced under
/// `output_tokens_details.reasoning_tokens` instead of being folded into the
/// visible completion count.
pub fn usage_metadata_to_alt_usage(meta: &Value) -> Value {
    let prompt_tokens = meta.get("promptTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let response_tokens = meta.get("candidatesTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let thoughts_tokens = meta.get("thoughtsTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let total_tokens = meta
        .get("totalTokenCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(prompt_tokens + response_tokens + thoughts_tokens);

    let completion_tokens = (response_tokens - thoughts_tokens).max(0);

    let mut usage = json!({
        "prompt_tokens": prompt_tokens,
        "completion_tokens": completion_tokens,
        "total_tokens": total_tokens,
    });
    if thoughts_tokens > 0 {
        usage["output_tokens_details"] = json!({"reasoning_tokens": thoughts_tokens});
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thoughts_tokens_are_subtracted_not_added() {
        let meta = json!({"promptTokenCount": 1, "candidatesTokenCount": 1, "thoughtsTokenCount": 4, "totalTokenCount": 6});
        let usage = usage_metadata_to_alt_usage(&meta);
        assert_eq!(usage["completion_tokens"], 0);
        assert_eq!(usage["output_tokens_details"]["reasoning_tokens"], 4);
    }

    #[test]
    fn completion_tokens_floor_at_zero() {
        let meta = json!({"promptTokenCount": 2, "candidatesTokenCount": 0, "thoughtsTokenCount": 10});
        let usage = usage_metadata_to_alt_usage(&meta);
        assert_eq!(usage["completion_tokens"], 0);
    }

    #[test]
    fn no_thoughts_tokens_omits_details_key() {
        let meta = json!({"promptTokenCount": 1, "candidatesTokenCount": 3, "totalTokenCount": 4});
        let usage = usage_metadata_to_alt_usage(&meta);
        assert_eq!(usage["completion_tokens"], 3);
        assert!(usage.get("output_tokens_details").is_none());
    }
}
