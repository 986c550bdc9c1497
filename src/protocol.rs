use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    pub query: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub chat_history: Vec<ChatHistoryEntry>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: u32,
    pub gender: String,
    pub privacy_policy: bool,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: bool,
    pub message: String,
}

/// Token accounting the backend appends as the last line of a chat stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// One classified line of the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    ToolName(String),
    ToolArgs(Value),
    ToolContent(String),
    Answer(String),
    Usage(TokenUsage),
}

impl StreamChunk {
    /// Classifies a decoded stream object.
    ///
    /// Returns `None` for anything the reducer has no transition for: unknown or
    /// missing `type`, a `content` of the wrong shape, or the `final_answer`
    /// summary (its text already arrived as `answer` deltas).
    pub fn classify(value: &Value) -> Option<Self> {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return serde_json::from_value::<TokenUsage>(value.clone())
                .ok()
                .map(StreamChunk::Usage);
        };
        let content = value.get("content");

        match kind {
            "tool_name" => content
                .and_then(Value::as_str)
                .map(|name| StreamChunk::ToolName(name.to_string())),
            "tool_args" => content.cloned().map(StreamChunk::ToolArgs),
            "tool_content" => content.map(|content| {
                StreamChunk::ToolContent(match content {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
            }),
            "answer" => content
                .and_then(Value::as_str)
                .map(|text| StreamChunk::Answer(text.to_string())),
            _ => None,
        }
    }
}
