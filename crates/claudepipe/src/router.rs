//! Frame routing and inbound control dispatch
//!
//! A single reader task owns the transport's frame sequence and classifies
//! every frame before anything becomes caller-visible: control responses
//! resolve pending requests, inbound control requests are dispatched and
//! answered, cancellations are dropped, and everything else goes to the
//! ordinary message queue in arrival order. Control traffic therefore never
//! appears in the caller's stream and ordinary messages are never held up by
//! an in-flight control request.

use crate::error::AgentError;
use crate::hooks::{HookCallback, HookContext};
use crate::mcp::SdkMcpServer;
use crate::options::{McpMessageHandler, PermissionCallback};
use claudepipe_protocol::control::{
    CanUseToolRequest, ControlResponseBody, HookCallbackRequest, McpMessageRequest,
};
use claudepipe_protocol::permissions::ToolPermissionContext;
use claudepipe_transport::Transport;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, warn};

/// Resolution of one outbound control request.
#[derive(Debug)]
pub(crate) enum ControlOutcome {
    /// The peer answered `success`; carries the `response` payload.
    Success(Value),
    /// The peer answered `error`; carries its message.
    Error(String),
}

/// One slot in the pending table.
pub(crate) enum Pending {
    /// A caller is blocked on this id.
    Waiting(oneshot::Sender<ControlOutcome>),
    /// The response arrived before any waiter registered; retained so a late
    /// registration can still observe it.
    Early(ControlOutcome),
}

/// Outbound control requests awaiting resolution, keyed by request id.
/// Written by the reader task, waited on by callers; torn down with the
/// connection.
pub(crate) type PendingTable = Arc<Mutex<HashMap<String, Pending>>>;

/// Callbacks answering inbound control requests. Fixed at connect time.
pub(crate) struct InboundCallbacks {
    pub can_use_tool: Option<Arc<PermissionCallback>>,
    pub hooks: HashMap<String, Arc<HookCallback>>,
    pub mcp_message_handler: Option<Arc<McpMessageHandler>>,
    pub sdk_mcp_servers: HashMap<String, Arc<SdkMcpServer>>,
}

/// State shared between the client and its reader task.
///
/// Deliberately excludes the ordinary-message sender: the reader task owns it
/// alone, so the queue closes the moment the reader exits.
pub(crate) struct RouterContext {
    pub transport: Arc<dyn Transport>,
    pub pending: PendingTable,
    pub callbacks: InboundCallbacks,
    /// Armed when a streamed prompt was written on a connection with inbound
    /// callbacks: the first `result` frame closes input, exactly once.
    pub close_input_on_first_result: AtomicBool,
}

/// The reader loop: sole consumer of the transport's frame sequence.
///
/// Ends on clean end-of-stream or on a fatal transport error, which is
/// delivered as the final queue item. Either way every pending control
/// request is failed by dropping its waiter, and dropping `messages` here
/// closes the caller-visible queue.
pub(crate) async fn run(
    ctx: Arc<RouterContext>,
    messages: mpsc::UnboundedSender<Result<Value, AgentError>>,
) {
    loop {
        match ctx.transport.next_frame().await {
            Ok(Some(frame)) => route(&ctx, &messages, frame).await,
            Ok(None) => {
                debug!("frame stream ended cleanly");
                break;
            }
            Err(e) => {
                debug!(error = %e, "frame stream ended with error");
                let _ = messages.send(Err(e.into()));
                break;
            }
        }
    }

    // Dropping the waiters resolves every in-flight send_control_request
    // with a connection-closed error.
    ctx.pending.lock().await.clear();
}

async fn route(
    ctx: &Arc<RouterContext>,
    messages: &mpsc::UnboundedSender<Result<Value, AgentError>>,
    frame: Value,
) {
    let frame_type = frame.get("type").and_then(Value::as_str).unwrap_or("");
    match frame_type {
        "control_response" => {
            let Some(body) = frame.get("response") else {
                warn!("control_response without response body dropped");
                return;
            };
            match serde_json::from_value::<ControlResponseBody>(body.clone()) {
                Ok(body) => resolve_control_response(&mut *ctx.pending.lock().await, body),
                Err(e) => warn!(error = %e, "malformed control_response dropped"),
            }
        }
        "control_request" => handle_inbound(ctx, &frame).await,
        "control_cancel_request" => {
            // No cancellation semantics: acknowledged and dropped.
            debug!("control_cancel_request dropped");
        }
        _ => {
            if frame_type == "result"
                && ctx.close_input_on_first_result.swap(false, Ordering::SeqCst)
            {
                ctx.transport.close_input().await;
            }
            let _ = messages.send(Ok(frame));
        }
    }
}

/// Resolve a control response against the pending table.
///
/// A registered waiter is removed and completed; an unknown id is retained as
/// an early resolution. A second response for an already-early id is a peer
/// protocol violation: the first resolution wins.
pub(crate) fn resolve_control_response(
    pending: &mut HashMap<String, Pending>,
    body: ControlResponseBody,
) {
    let outcome = if body.subtype == "error" {
        ControlOutcome::Error(body.error_message())
    } else {
        ControlOutcome::Success(body.response.clone().unwrap_or_else(|| json!({})))
    };

    match pending.remove(&body.request_id) {
        Some(Pending::Waiting(waiter)) => {
            if waiter.send(outcome).is_err() {
                // Waiter timed out between table removal and here; the entry
                // is gone either way.
                debug!(request_id = %body.request_id, "control response for abandoned waiter");
            }
        }
        Some(Pending::Early(first)) => {
            error!(request_id = %body.request_id, "duplicate control response");
            debug_assert!(false, "control request resolved twice");
            pending.insert(body.request_id, Pending::Early(first));
        }
        None => {
            pending.insert(body.request_id, Pending::Early(outcome));
        }
    }
}

/// Answer one inbound control request with exactly one `control_response`.
///
/// Handler failures are converted to error responses at this boundary; they
/// never terminate the reader loop.
async fn handle_inbound(ctx: &Arc<RouterContext>, frame: &Value) {
    let Some(request_id) = frame.get("request_id").and_then(Value::as_str) else {
        warn!("inbound control_request without request_id dropped");
        return;
    };
    let Some(request) = frame.get("request").filter(|v| v.is_object()) else {
        warn!(request_id, "inbound control_request without request body dropped");
        return;
    };

    let response = match dispatch(ctx, request).await {
        Ok(data) => json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": data,
            },
        }),
        Err(e) => json!({
            "type": "control_response",
            "response": {
                "subtype": "error",
                "request_id": request_id,
                "error": e.to_string(),
            },
        }),
    };

    if let Err(e) = ctx.transport.write(&response).await {
        warn!(request_id, error = %e, "failed to write control response");
    }
}

async fn dispatch(ctx: &Arc<RouterContext>, request: &Value) -> Result<Value, AgentError> {
    let subtype = request.get("subtype").and_then(Value::as_str).unwrap_or("");
    match subtype {
        "can_use_tool" => dispatch_can_use_tool(ctx, request).await,
        "hook_callback" => dispatch_hook_callback(ctx, request).await,
        "mcp_message" => dispatch_mcp_message(ctx, request).await,
        other => Err(AgentError::Handler(format!(
            "Unsupported control request subtype: {other}"
        ))),
    }
}

async fn dispatch_can_use_tool(
    ctx: &Arc<RouterContext>,
    request: &Value,
) -> Result<Value, AgentError> {
    let Some(callback) = &ctx.callbacks.can_use_tool else {
        return Err(AgentError::Handler(
            "can_use_tool callback is not provided".to_string(),
        ));
    };

    let request: CanUseToolRequest = serde_json::from_value(request.clone())
        .map_err(|e| AgentError::Handler(format!("invalid can_use_tool request: {e}")))?;

    let context = ToolPermissionContext {
        suggestions: request.permission_suggestions,
        blocked_path: request.blocked_path,
    };
    let result = callback(request.tool_name, request.input.clone(), context).await?;
    Ok(result.into_wire(&request.input))
}

async fn dispatch_hook_callback(
    ctx: &Arc<RouterContext>,
    request: &Value,
) -> Result<Value, AgentError> {
    if request.get("callback_id").and_then(Value::as_str).is_none() {
        return Err(AgentError::Handler(
            "Hook callback missing callback_id".to_string(),
        ));
    }
    let request: HookCallbackRequest = serde_json::from_value(request.clone())
        .map_err(|e| AgentError::Handler(format!("invalid hook_callback request: {e}")))?;

    let Some(callback) = ctx.callbacks.hooks.get(&request.callback_id) else {
        return Err(AgentError::Handler(format!(
            "No hook callback found for ID: {}",
            request.callback_id
        )));
    };

    let output = callback(request.input, request.tool_use_id, HookContext::default()).await?;
    Ok(serde_json::to_value(output)?)
}

async fn dispatch_mcp_message(
    ctx: &Arc<RouterContext>,
    request: &Value,
) -> Result<Value, AgentError> {
    let request: McpMessageRequest = serde_json::from_value(request.clone())
        .map_err(|_| AgentError::Handler("Invalid mcp_message request".to_string()))?;
    if !request.message.is_object() {
        return Err(AgentError::Handler(
            "Invalid mcp_message request".to_string(),
        ));
    }

    if let Some(handler) = &ctx.callbacks.mcp_message_handler {
        let reply = handler(request.server_name, request.message).await?;
        return Ok(json!({"mcp_response": reply}));
    }

    if let Some(server) = ctx.callbacks.sdk_mcp_servers.get(&request.server_name) {
        let reply = server.handle_message(&request.message).await;
        return Ok(json!({"mcp_response": reply}));
    }

    Err(AgentError::Handler(format!(
        "No MCP handler or SDK server configured for '{}'",
        request.server_name
    )))
}
