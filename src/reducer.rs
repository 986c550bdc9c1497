//! Folds classified stream chunks into the state of one assistant turn.

use crate::protocol::{StreamChunk, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result text shown for a tool that has been called but not yet answered.
pub const PROCESSING: &str = "Processing...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub name: String,
    pub args: Value,
    pub content: String,
}

impl ToolExecution {
    pub fn is_in_progress(&self) -> bool {
        self.content == PROCESSING
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingTool {
    pub name: Option<String>,
    pub args: Value,
    pub content: String,
}

/// What the view renders while a turn is still streaming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub tools: Vec<ToolExecution>,
    pub answer: String,
}

/// Everything a finished stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutput {
    pub answer: String,
    pub tools: Vec<ToolExecution>,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Default)]
pub struct ChatReducer {
    answer: String,
    tools: Vec<ToolExecution>,
    pending: PendingTool,
    usage: Option<TokenUsage>,
}

impl ChatReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded stream object. Returns `false` when the object is
    /// not a chunk the reducer understands.
    pub fn apply_value(&mut self, value: &Value) -> bool {
        match StreamChunk::classify(value) {
            Some(chunk) => {
                self.apply(chunk);
                true
            }
            None => {
                tracing::trace!(%value, "ignoring unrecognised stream object");
                false
            }
        }
    }

    pub fn apply(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::ToolName(name) => {
                // An empty name leaves no tool pending.
                self.pending = PendingTool {
                    name: (!name.is_empty()).then_some(name),
                    ..PendingTool::default()
                };
            }
            StreamChunk::ToolArgs(args) => {
                self.pending.args = args;
                let Some(name) = self.pending.name.clone() else {
                    return;
                };
                let args = self.pending.args.clone();
                self.upsert(ToolExecution {
                    name,
                    args,
                    content: PROCESSING.to_string(),
                });
            }
            StreamChunk::ToolContent(content) => {
                self.pending.content = content;
                let pending = std::mem::take(&mut self.pending);
                let Some(name) = pending.name else {
                    return;
                };
                self.upsert(ToolExecution {
                    name,
                    args: pending.args,
                    content: pending.content,
                });
            }
            StreamChunk::Answer(delta) => self.answer.push_str(&delta),
            StreamChunk::Usage(usage) => {
                tracing::debug!(
                    input = usage.input_tokens,
                    output = usage.output_tokens,
                    total = usage.total_tokens,
                    "stream usage"
                );
                self.usage = Some(usage);
            }
        }
    }

    // Only one call per tool name can be in flight: a second same-named call
    // arriving before the first completes overwrites the first entry.
    fn upsert(&mut self, tool: ToolExecution) {
        match self
            .tools
            .iter_mut()
            .find(|existing| existing.name == tool.name && existing.is_in_progress())
        {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn pending(&self) -> &PendingTool {
        &self.pending
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tools: self.tools.clone(),
            answer: self.answer.clone(),
        }
    }

    pub fn finish(self) -> TurnOutput {
        TurnOutput {
            answer: self.answer,
            tools: self.tools,
            usage: self.usage,
        }
    }
}

/// Renders tool arguments for display.
pub fn format_tool_args(args: &Value) -> String {
    match args {
        Value::Null => "{}".to_string(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(args).unwrap_or_else(|_| args.to_string())
        }
        Value::String(raw) if raw.trim_start().starts_with('{') => {
            serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|parsed| serde_json::to_string_pretty(&parsed).ok())
                .unwrap_or_else(|| raw.clone())
        }
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(reducer: &mut ChatReducer, values: &[Value]) {
        for value in values {
            reducer.apply_value(value);
        }
    }

    #[test]
    fn tool_call_then_answer() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": "search"}),
                json!({"type": "tool_args", "content": {"q": "x"}}),
                json!({"type": "tool_content", "content": "42"}),
                json!({"type": "answer", "content": "The answer is 42"}),
            ],
        );
        let output = reducer.finish();
        assert_eq!(output.answer, "The answer is 42");
        assert_eq!(
            output.tools,
            vec![ToolExecution {
                name: "search".into(),
                args: json!({"q": "x"}),
                content: "42".into(),
            }]
        );
    }

    #[test]
    fn args_mark_tool_in_progress() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": "search"}),
                json!({"type": "tool_args", "content": "{\"q\":\"x\"}"}),
            ],
        );
        let snapshot = reducer.snapshot();
        assert_eq!(snapshot.tools.len(), 1);
        assert!(snapshot.tools[0].is_in_progress());
        assert_eq!(snapshot.tools[0].args, json!("{\"q\":\"x\"}"));
    }

    #[test]
    fn orphan_args_and_content_create_nothing() {
        let mut reducer = ChatReducer::new();
        reducer.apply_value(&json!({"type": "tool_args", "content": {"q": 1}}));
        reducer.apply_value(&json!({"type": "tool_content", "content": "r"}));
        assert!(reducer.snapshot().tools.is_empty());
        assert_eq!(reducer.pending(), &PendingTool::default());
    }

    #[test]
    fn empty_tool_name_creates_nothing() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": ""}),
                json!({"type": "tool_args", "content": {"q": 1}}),
                json!({"type": "tool_content", "content": "r"}),
            ],
        );
        assert!(reducer.snapshot().tools.is_empty());
        assert_eq!(reducer.pending(), &PendingTool::default());
    }

    #[test]
    fn completion_replaces_in_place() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": "first"}),
                json!({"type": "tool_args", "content": {}}),
                json!({"type": "tool_name", "content": "second"}),
                json!({"type": "tool_args", "content": {}}),
                json!({"type": "tool_content", "content": "two"}),
                json!({"type": "tool_name", "content": "first"}),
                json!({"type": "tool_content", "content": "one"}),
            ],
        );
        let tools = reducer.snapshot().tools;
        let names: Vec<_> = tools.iter().map(|t| (t.name.as_str(), t.content.as_str())).collect();
        assert_eq!(names, vec![("first", "one"), ("second", "two")]);
        // args were cleared by the repeated tool_name before completion
        assert_eq!(tools[0].args, Value::Null);
    }

    #[test]
    fn repeated_args_update_the_same_entry() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": "search"}),
                json!({"type": "tool_args", "content": {"q": 1}}),
                json!({"type": "tool_args", "content": {"q": 2}}),
            ],
        );
        let tools = reducer.snapshot().tools;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].args, json!({"q": 2}));
    }

    #[test]
    fn content_without_args_appends_completed_tool() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "tool_name", "content": "clock"}),
                json!({"type": "tool_content", "content": "noon"}),
            ],
        );
        let tools = reducer.snapshot().tools;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].content, "noon");
        assert!(reducer.pending().name.is_none());
    }

    #[test]
    fn answers_accumulate_and_usage_is_kept() {
        let mut reducer = ChatReducer::new();
        feed(
            &mut reducer,
            &[
                json!({"type": "answer", "content": "Hel"}),
                json!({"type": "answer", "content": "lo"}),
                json!({"type": "final_answer", "content": "Hello"}),
                json!({"input_tokens": 3, "output_tokens": 2, "total_tokens": 5}),
            ],
        );
        let output = reducer.finish();
        assert_eq!(output.answer, "Hello");
        assert_eq!(output.usage.map(|u| u.total_tokens), Some(5));
    }

    #[test]
    fn unknown_objects_are_reported_as_unapplied() {
        let mut reducer = ChatReducer::new();
        assert!(!reducer.apply_value(&json!({"type": "mystery", "content": "?"})));
        assert!(reducer.apply_value(&json!({"type": "answer", "content": "ok"})));
        assert_eq!(reducer.snapshot().answer, "ok");
    }

    #[test]
    fn formats_tool_args() {
        assert_eq!(format_tool_args(&Value::Null), "{}");
        assert_eq!(format_tool_args(&json!({"q": 1})), "{\n  \"q\": 1\n}");
        assert_eq!(format_tool_args(&json!("{\"q\":1}")), "{\n  \"q\": 1\n}");
        assert_eq!(format_tool_args(&json!("{broken")), "{broken");
        assert_eq!(format_tool_args(&json!("plain")), "plain");
        assert_eq!(format_tool_args(&json!(7)), "7");
    }
}
