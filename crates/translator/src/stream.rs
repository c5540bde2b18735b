use futures::Stream;
use genrelay_core::error::GatewayError;
use genrelay_provider::StreamChunk;
use genrelay_types::{FinishReason, usage_metadata_to_alt_usage};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChoiceState {
    AwaitingFirst,
    Open,
    Closed,
}

/// Per-stream, per-choice-index state machine that turns native streaming
/// chunks into alt-chat SSE frames. Each choice index emits its role-bearing
/// prelude exactly once, then content/tool-call deltas, then a single
/// finish-reason frame, and never emits again once closed.
struct StreamTransformer {
    completion_id: String,
    model: String,
    created: i64,
    states: HashMap<i64, ChoiceState>,
    include_usage: bool,
    pending_usage: Option<Value>,
    done: bool,
}

impl StreamTransformer {
    fn new(model: String, include_usage: bool) -> Self {
        Self {
            completion_id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            model,
            created: chrono::Utc::now().timestamp(),
            states: HashMap::new(),
            include_usage,
            pending_usage: None,
            done: false,
        }
    }

    /// Process one upstream chunk and return zero or more alt-chat SSE data frames.
    ///
    /// When a candidate carries both a content/tool-call delta and a terminal
    /// `finishReason` in the same native chunk, they are merged into one alt
    /// chunk (`delta` + `finish_reason`, plus `usage` when the chunk also
    /// carried `usageMetadata`) rather than emitted as separate frames.
    fn handle_chunk(&mut self, raw: &str) -> Result<Vec<Value>, GatewayError> {
        let parsed: Value = serde_json::from_str(raw)?;
        let mut frames = Vec::new();

        if let Some(block_reason) = parsed.get("promptFeedback").and_then(|f| f.get("blockReason")).and_then(|b| b.as_str()) {
            let state = self.states.entry(0).or_insert(ChoiceState::AwaitingFirst);
            if *state != ChoiceState::Closed {
                if *state == ChoiceState::AwaitingFirst {
                    frames.push(self.prelude_frame(0));
                }
                frames.push(self.finish_frame(0, "content_filter", None, None));
                *state = ChoiceState::Closed;
                tracing::debug!(block_reason, "stream blocked by prompt feedback");
            }
            return Ok(frames);
        }

        let usage_here = parsed.get("usageMetadata").map(usage_metadata_to_alt_usage);
        let mut usage_attached = false;

        let candidates = parsed.get("candidates").and_then(|c| c.as_array()).cloned().unwrap_or_default();
        for candidate in &candidates {
            let index = candidate.get("index").and_then(|i| i.as_i64()).unwrap_or(0);
            let state = *self.states.entry(index).or_insert(ChoiceState::AwaitingFirst);
            if state == ChoiceState::Closed {
                continue;
            }
            if state == ChoiceState::AwaitingFirst {
                frames.push(self.prelude_frame(index));
                self.states.insert(index, ChoiceState::Open);
            }

            let parts = candidate.get("content").and_then(|c| c.get("parts")).and_then(|p| p.as_array()).cloned().unwrap_or_default();
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
                        "index": tool_calls.len(),
                        "id": format!("call_{}", uuid::Uuid::new_v4()),
                        "type": "function",
                        "function": {"name": name, "arguments": serde_json::to_string(&args).unwrap_or_default()},
                    }));
                }
            }

            let mut delta = json!({});
            if !text.is_empty() {
                delta["content"] = json!(text);
            }
            if !tool_calls.is_empty() {
                delta["tool_calls"] = json!(tool_calls);
            }
            let has_delta = !text.is_empty() || !tool_calls.is_empty();

            if let Some(raw_reason) = candidate.get("finishReason").and_then(|f| f.as_str()) {
                let reason = FinishReason::from_native(Some(raw_reason), !tool_calls.is_empty());
                let usage_for_frame = if usage_attached { None } else { usage_here.clone() };
                if usage_for_frame.is_some() {
                    usage_attached = true;
                }
                frames.push(self.finish_frame(index, reason.as_str(), has_delta.then_some(delta), usage_for_frame));
                self.states.insert(index, ChoiceState::Closed);
            } else if has_delta {
                frames.push(self.delta_frame(index, delta));
            }
        }

        if !usage_attached
            && let Some(usage) = usage_here
        {
            self.pending_usage = Some(usage);
        }

        Ok(frames)
    }

    fn base_chunk(&self) -> Value {
        json!({
            "id": self.completion_id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
        })
    }

    fn prelude_frame(&self, index: i64) -> Value {
        let mut chunk = self.base_chunk();
        chunk["choices"] = json!([{"index": index, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]);
        chunk
    }

    fn delta_frame(&self, index: i64, delta: Value) -> Value {
        let mut chunk = self.base_chunk();
        chunk["choices"] = json!([{"index": index, "delta": delta, "finish_reason": null}]);
        chunk
    }

    fn finish_frame(&self, index: i64, reason: &str, delta: Option<Value>, usage: Option<Value>) -> Value {
        let mut chunk = self.base_chunk();
        let delta = delta.unwrap_or_else(|| json!({}));
        chunk["choices"] = json!([{"index": index, "delta": delta, "finish_reason": reason}]);
        if let Some(usage) = usage {
            chunk["usage"] = usage;
        }
        chunk
    }

    /// All choices have been closed, or the upstream ended — flush a final
    /// usage-only chunk (when requested) and the terminal sentinel.
    fn flush(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        if self.include_usage
            && let Some(usage) = self.pending_usage.take()
        {
            let mut chunk = self.base_chunk();
            chunk["choices"] = json!([]);
            chunk["usage"] = usage;
            frames.push(chunk);
        }
        frames
    }
}

enum OutFrame {
    Data(Value),
    Done,
}

struct DriveState {
    upstream: Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>,
    transformer: StreamTransformer,
    outbox: VecDeque<OutFrame>,
    finished: bool,
}

/// Turn a native stream into alt-chat SSE text frames. `include_usage` is
/// forced `true` by the caller regardless of what the client's
/// `stream_options.include_usage` said, so every streamed call carries a
/// token count the gateway can account for.
pub fn transform_to_alt_sse(
    model: String,
    include_usage: bool,
    upstream: Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>> {
    let state = DriveState {
        upstream,
        transformer: StreamTransformer::new(model, include_usage),
        outbox: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.outbox.pop_front() {
                let text = match frame {
                    OutFrame::Data(v) => format!("data: {v}\n\n"),
                    OutFrame::Done => "data: [DONE]\n\n".to_string(),
                };
                return Some((Ok(text), state));
            }

            if state.finished {
                return None;
            }

            match tokio_stream::StreamExt::next(&mut state.upstream).await {
                Some(Ok(chunk)) => match state.transformer.handle_chunk(&chunk.data) {
                    Ok(frames) => {
                        state.outbox.extend(frames.into_iter().map(OutFrame::Data));
                        continue;
                    }
                    Err(e) => return Some((Err(e), state)),
                },
                Some(Err(e)) => return Some((Err(e), state)),
                None => {
                    state.outbox.extend(state.transformer.flush().into_iter().map(OutFrame::Data));
                    state.outbox.push_back(OutFrame::Done);
                    state.finished = true;
                    continue;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    fn chunk(json_text: &str) -> Result<StreamChunk, GatewayError> {
        Ok(StreamChunk { data: json_text.to_string() })
    }

    #[tokio::test]
    async fn prelude_emitted_once_then_deltas_then_finish() {
        let upstream = stream::iter(vec![
            chunk(r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"hel"}]}}]}"#),
            chunk(r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"lo"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":1,"candidatesTokenCount":2,"totalTokenCount":3}}"#),
        ]);
        let out = transform_to_alt_sse("gemini-x".to_string(), true, Box::pin(upstream));
        let frames: Vec<String> = out.map(|r| r.unwrap()).collect().await;

        assert_eq!(frames.len(), 4);
        assert!(frames[0].contains("\"role\":\"assistant\""));
        assert!(frames[1].contains("\"content\":\"hel\""));
        assert!(frames[2].contains("\"content\":\"lo\""));
        assert!(frames[2].contains("\"finish_reason\":\"stop\""));
        assert!(frames[2].contains("\"usage\""));
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn blocked_prompt_closes_choice_zero_with_content_filter() {
        let upstream = stream::iter(vec![chunk(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)]);
        let out = transform_to_alt_sse("gemini-x".to_string(), false, Box::pin(upstream));
        let frames: Vec<String> = out.map(|r| r.unwrap()).collect().await;
        assert!(frames.iter().any(|f| f.contains("content_filter")));
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
    }

    #[tokio::test]
    async fn closed_choice_never_emits_again() {
        let upstream = stream::iter(vec![
            chunk(r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"a"}]},"finishReason":"STOP"}]}"#),
            chunk(r#"{"candidates":[{"index":0,"content":{"parts":[{"text":"b"}]}}]}"#),
        ]);
        let out = transform_to_alt_sse("gemini-x".to_string(), false, Box::pin(upstream));
        let frames: Vec<String> = out.map(|r| r.unwrap()).collect().await;
        assert!(!frames.iter().any(|f| f.contains("\"content\":\"b\"")));
    }
}
