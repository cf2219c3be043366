//! Typed views of conversation frames
//!
//! Frames that are not control traffic parse into [`Message`]. Every variant
//! keeps the raw frame so callers can reach fields this crate does not model.

use crate::content::ContentBlock;
use crate::error::MessageParseError;
use serde_json::Value;

/// A conversation frame from the CLI, classified by its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A user turn, either echoed back or synthesized by the CLI.
    User(UserMessage),
    /// An assistant turn.
    Assistant(AssistantMessage),
    /// A CLI status message (`init`, `compact_boundary`, ...).
    System(SystemMessage),
    /// The terminal frame of one conversation turn.
    Result(ResultMessage),
    /// A partial-message event (only with `include_partial_messages`).
    StreamEvent(StreamEvent),
    /// A frame type this crate does not know about.
    Unknown {
        /// The wire `type` value.
        message_type: String,
        /// The raw frame.
        raw: Value,
    },
}

/// Content of a user message: plain text or structured blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    /// Plain text content.
    Text(String),
    /// Structured content blocks.
    Blocks(Vec<ContentBlock>),
}

/// A `user` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    /// Message content.
    pub content: UserContent,
    /// Frame uuid, when present.
    pub uuid: Option<String>,
    /// Id of the parent tool use, for messages produced inside a tool call.
    pub parent_tool_use_id: Option<String>,
    /// Raw tool-use result attached to the message, when present.
    pub tool_use_result: Option<Value>,
    /// The raw frame.
    pub raw: Value,
}

/// An `assistant` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    /// Content blocks of the turn.
    pub content: Vec<ContentBlock>,
    /// Model that produced the turn.
    pub model: Option<String>,
    /// Id of the parent tool use, for messages produced inside a tool call.
    pub parent_tool_use_id: Option<String>,
    /// Error reported inside the message envelope, when present.
    pub error: Option<String>,
    /// The raw frame.
    pub raw: Value,
}

/// A `system` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    /// System message subtype.
    pub subtype: String,
    /// The raw frame.
    pub raw: Value,
}

/// A `result` frame, ending one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    /// Result subtype (`success`, `error_max_turns`, ...).
    pub subtype: String,
    /// Wall-clock duration of the turn in milliseconds.
    pub duration_ms: i64,
    /// API time spent in milliseconds.
    pub duration_api_ms: i64,
    /// Whether the turn ended in an error.
    pub is_error: bool,
    /// Number of turns consumed.
    pub num_turns: i64,
    /// Session the turn belongs to.
    pub session_id: String,
    /// Total cost in USD, when reported.
    pub total_cost_usd: Option<f64>,
    /// Raw usage record, when reported.
    pub usage: Option<Value>,
    /// Raw result payload, when reported.
    pub result: Option<Value>,
    /// Structured output, when an output schema was configured.
    pub structured_output: Option<Value>,
    /// The raw frame.
    pub raw: Value,
}

/// A `stream_event` frame carrying a partial-message update.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Event uuid.
    pub uuid: String,
    /// Session the event belongs to.
    pub session_id: String,
    /// The raw streaming event.
    pub event: Value,
    /// Id of the parent tool use, when nested.
    pub parent_tool_use_id: Option<String>,
    /// The raw frame.
    pub raw: Value,
}

impl Message {
    /// Parse one decoded frame into its typed form.
    ///
    /// Unrecognized `type` values become [`Message::Unknown`]; a frame with no
    /// string `type` at all is a parse error.
    pub fn parse(raw: Value) -> Result<Message, MessageParseError> {
        let Some(message_type) = raw.get("type").and_then(Value::as_str) else {
            return Err(MessageParseError::MissingType { raw });
        };

        match message_type {
            "user" => parse_user(raw),
            "assistant" => parse_assistant(raw),
            "system" => parse_system(raw),
            "result" => parse_result(raw),
            "stream_event" => parse_stream_event(raw),
            other => Ok(Message::Unknown {
                message_type: other.to_string(),
                raw,
            }),
        }
    }

    /// The wire `type` of this message.
    pub fn message_type(&self) -> &str {
        match self {
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
            Message::System(_) => "system",
            Message::Result(_) => "result",
            Message::StreamEvent(_) => "stream_event",
            Message::Unknown { message_type, .. } => message_type,
        }
    }

    /// The raw frame this message was parsed from.
    pub fn raw(&self) -> &Value {
        match self {
            Message::User(m) => &m.raw,
            Message::Assistant(m) => &m.raw,
            Message::System(m) => &m.raw,
            Message::Result(m) => &m.raw,
            Message::StreamEvent(m) => &m.raw,
            Message::Unknown { raw, .. } => raw,
        }
    }
}

fn opt_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn parse_user(raw: Value) -> Result<Message, MessageParseError> {
    let message = raw.get("message").cloned().unwrap_or_default();
    let content = match message.get("content") {
        Some(Value::Array(blocks)) => {
            UserContent::Blocks(blocks.iter().map(ContentBlock::from_value).collect())
        }
        Some(Value::String(text)) => UserContent::Text(text.clone()),
        _ => UserContent::Text(String::new()),
    };

    Ok(Message::User(UserMessage {
        content,
        uuid: opt_str(&raw, "uuid"),
        parent_tool_use_id: opt_str(&raw, "parent_tool_use_id"),
        tool_use_result: raw.get("tool_use_result").filter(|v| !v.is_null()).cloned(),
        raw,
    }))
}

fn parse_assistant(raw: Value) -> Result<Message, MessageParseError> {
    let message = raw.get("message").cloned().unwrap_or_default();
    let content = match message.get("content") {
        Some(Value::Array(blocks)) => blocks.iter().map(ContentBlock::from_value).collect(),
        _ => Vec::new(),
    };

    Ok(Message::Assistant(AssistantMessage {
        content,
        model: opt_str(&message, "model"),
        parent_tool_use_id: opt_str(&raw, "parent_tool_use_id"),
        error: opt_str(&message, "error"),
        raw,
    }))
}

fn parse_system(raw: Value) -> Result<Message, MessageParseError> {
    let Some(subtype) = raw.get("subtype").and_then(Value::as_str) else {
        return Err(MessageParseError::MissingField {
            kind: "system",
            field: "subtype",
            raw,
        });
    };
    Ok(Message::System(SystemMessage {
        subtype: subtype.to_string(),
        raw,
    }))
}

fn parse_result(raw: Value) -> Result<Message, MessageParseError> {
    for field in [
        "subtype",
        "duration_ms",
        "duration_api_ms",
        "is_error",
        "num_turns",
        "session_id",
    ] {
        if raw.get(field).is_none() {
            return Err(MessageParseError::MissingField {
                kind: "result",
                field,
                raw,
            });
        }
    }

    Ok(Message::Result(ResultMessage {
        subtype: opt_str(&raw, "subtype").unwrap_or_default(),
        duration_ms: raw["duration_ms"].as_i64().unwrap_or_default(),
        duration_api_ms: raw["duration_api_ms"].as_i64().unwrap_or_default(),
        is_error: raw["is_error"].as_bool().unwrap_or_default(),
        num_turns: raw["num_turns"].as_i64().unwrap_or_default(),
        session_id: opt_str(&raw, "session_id").unwrap_or_default(),
        total_cost_usd: raw.get("total_cost_usd").and_then(Value::as_f64),
        usage: raw.get("usage").filter(|v| !v.is_null()).cloned(),
        result: raw.get("result").filter(|v| !v.is_null()).cloned(),
        structured_output: raw
            .get("structured_output")
            .filter(|v| !v.is_null())
            .cloned(),
        raw,
    }))
}

fn parse_stream_event(raw: Value) -> Result<Message, MessageParseError> {
    for field in ["uuid", "session_id", "event"] {
        if raw.get(field).is_none() {
            return Err(MessageParseError::MissingField {
                kind: "stream_event",
                field,
                raw,
            });
        }
    }

    Ok(Message::StreamEvent(StreamEvent {
        uuid: opt_str(&raw, "uuid").unwrap_or_default(),
        session_id: opt_str(&raw, "session_id").unwrap_or_default(),
        event: raw["event"].clone(),
        parent_tool_use_id: opt_str(&raw, "parent_tool_use_id"),
        raw,
    }))
}
