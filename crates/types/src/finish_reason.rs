/// Alt-format finish reasons, mapped from native `finishReason` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::ToolCalls => "tool_calls",
        }
    }

    /// Map a native `finishReason` string, given whether any part in the
    /// candidate carried a `functionCall`. A function call always wins,
    /// regardless of the raw reason the upstream reported.
    pub fn from_native(raw: Option<&str>, has_function_call: bool) -> Self {
        if has_function_call {
            return Self::ToolCalls;
        }
        match raw {
            Some("MAX_TOKENS") => Self::Length,
            Some("SAFETY") | Some("RECITATION") => Self::ContentFilter,
            Some("FUNCTION_CALL") => Self::ToolCalls,
            // STOP, OTHER, UNKNOWN, *_UNSPECIFIED, and anything unrecognized.
            _ => Self::Stop,
        }
    }
}
