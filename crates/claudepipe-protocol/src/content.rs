//! Content blocks carried inside user and assistant messages

use serde_json::Value;

/// One block of message content.
///
/// Blocks with an unrecognized `type` become [`ContentBlock::Unknown`] so a
/// newer CLI never breaks parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Extended thinking emitted by the model.
    Thinking {
        /// The thinking content.
        thinking: String,
        /// Integrity signature over the thinking content.
        signature: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        /// Tool-use id, echoed back in the matching result block.
        id: String,
        /// Name of the tool.
        name: String,
        /// Tool input.
        input: Value,
    },
    /// The result of an earlier tool invocation.
    ToolResult {
        /// Id of the tool use this result answers.
        tool_use_id: String,
        /// Result content, if any.
        content: Option<Value>,
        /// Whether the tool reported an error.
        is_error: Option<bool>,
    },
    /// A block type this crate does not know about.
    Unknown {
        /// The wire `type` value.
        block_type: String,
        /// The raw block.
        raw: Value,
    },
}

impl ContentBlock {
    /// Parse one content block from its raw JSON form.
    ///
    /// A block without a string `type` field parses as `Unknown` with an
    /// empty type; known types tolerate missing payload fields the same way
    /// the CLI tolerates them (empty defaults).
    pub fn from_value(block: &Value) -> Self {
        let Some(block_type) = block.get("type").and_then(Value::as_str) else {
            return ContentBlock::Unknown {
                block_type: String::new(),
                raw: block.clone(),
            };
        };

        match block_type {
            "text" => ContentBlock::Text {
                text: str_field(block, "text"),
            },
            "thinking" => ContentBlock::Thinking {
                thinking: str_field(block, "thinking"),
                signature: str_field(block, "signature"),
            },
            "tool_use" => ContentBlock::ToolUse {
                id: str_field(block, "id"),
                name: str_field(block, "name"),
                input: block
                    .get("input")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            },
            "tool_result" => ContentBlock::ToolResult {
                tool_use_id: str_field(block, "tool_use_id"),
                content: block.get("content").filter(|v| !v.is_null()).cloned(),
                is_error: block.get("is_error").and_then(Value::as_bool),
            },
            other => ContentBlock::Unknown {
                block_type: other.to_string(),
                raw: block.clone(),
            },
        }
    }

    /// The wire `type` of this block.
    pub fn block_type(&self) -> &str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Thinking { .. } => "thinking",
            ContentBlock::ToolUse { .. } => "tool_use",
            ContentBlock::ToolResult { .. } => "tool_result",
            ContentBlock::Unknown { block_type, .. } => block_type,
        }
    }
}

fn str_field(block: &Value, field: &str) -> String {
    block
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_block() {
        let block = ContentBlock::from_value(&json!({"type": "text", "text": "hello"}));
        assert_eq!(
            block,
            ContentBlock::Text {
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn parses_tool_use_block() {
        let block = ContentBlock::from_value(&json!({
            "type": "tool_use",
            "id": "tool_123",
            "name": "Read",
            "input": {"file_path": "/tmp/x"}
        }));
        match block {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "tool_123");
                assert_eq!(name, "Read");
                assert_eq!(input["file_path"], "/tmp/x");
            }
            other => panic!("expected tool_use, got {other:?}"),
        }
    }

    #[test]
    fn parses_tool_result_block() {
        let block = ContentBlock::from_value(&json!({
            "type": "tool_result",
            "tool_use_id": "tool_123",
            "content": [{"type": "text", "text": "ok"}],
            "is_error": false
        }));
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "tool_123");
                assert!(content.is_some());
                assert_eq!(is_error, Some(false));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_block_type_is_preserved() {
        let raw = json!({"type": "server_tool_use", "id": "x"});
        let block = ContentBlock::from_value(&raw);
        match block {
            ContentBlock::Unknown { block_type, raw: r } => {
                assert_eq!(block_type, "server_tool_use");
                assert_eq!(r, raw);
            }
            other => panic!("expected unknown, got {other:?}"),
        }
    }
}
