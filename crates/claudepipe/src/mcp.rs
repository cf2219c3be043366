//! In-process SDK MCP servers
//!
//! An SDK MCP server runs inside the host process and is bridged to the CLI
//! over `mcp_message` control requests instead of a subprocess of its own.
//! It implements the small JSON-RPC subset the CLI speaks to tool servers:
//! `initialize`, `tools/list`, `tools/call`, and `notifications/initialized`.

use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Async handler for one tool: arguments in, result out.
///
/// A returned error becomes an `is_error` tool result, never a protocol
/// failure.
pub type ToolHandler =
    dyn Fn(Value) -> BoxFuture<'static, std::result::Result<Value, String>> + Send + Sync;

/// One tool registered on an SDK MCP server.
#[derive(Clone)]
pub struct SdkTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Arc<ToolHandler>,
}

/// Build a tool from an async closure.
pub fn tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    input_schema: Value,
    handler: F,
) -> SdkTool
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
{
    SdkTool {
        name: name.into(),
        description: description.into(),
        input_schema,
        handler: Arc::new(move |arguments| Box::pin(handler(arguments))),
    }
}

impl SdkTool {
    /// The tool's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An in-process MCP server: a named, immutable tool registry.
///
/// Immutable after construction; share it with `Arc::clone`.
#[derive(Clone)]
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: HashMap<String, SdkTool>,
}

impl std::fmt::Debug for SdkMcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tool_count", &self.tools.len())
            .finish()
    }
}

impl SdkMcpServer {
    /// Create a server with the given tools.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        tools: impl IntoIterator<Item = SdkTool>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: tools
                .into_iter()
                .map(|tool| (tool.name.clone(), tool))
                .collect(),
        }
    }

    /// The server's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any tools are registered.
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Tool descriptors in `tools/list` wire form.
    pub fn list_tools(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                })
            })
            .collect()
    }

    /// Invoke a tool by name.
    ///
    /// Unknown tools and handler failures produce an `is_error` tool result;
    /// this method itself never fails.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            return error_content(format!("Tool '{name}' not found"));
        };

        match (tool.handler)(arguments).await {
            Ok(Value::Object(result)) => Value::Object(result),
            Ok(Value::String(text)) => json!({
                "content": [{"type": "text", "text": text}],
            }),
            Ok(other) => json!({
                "content": [{"type": "text", "text": other.to_string()}],
            }),
            Err(message) => error_content(message),
        }
    }

    /// Answer one JSON-RPC message from the CLI bridge.
    pub async fn handle_message(&self, message: &Value) -> Value {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let params = message.get("params").cloned().unwrap_or_default();

        match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": self.name, "version": self.version},
                },
            }),
            "tools/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": self.list_tools()},
            }),
            "tools/call" => {
                let tool_name = params.get("name").and_then(Value::as_str).unwrap_or("");
                let arguments = params
                    .get("arguments")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                let result = self.call_tool(tool_name, arguments).await;
                json!({"jsonrpc": "2.0", "id": id, "result": result})
            }
            "notifications/initialized" => json!({"jsonrpc": "2.0", "result": {}}),
            other => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method '{other}' not found")},
            }),
        }
    }
}

fn error_content(message: String) -> Value {
    json!({
        "is_error": true,
        "content": [{"type": "text", "text": message}],
    })
}
