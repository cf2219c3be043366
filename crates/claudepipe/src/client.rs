//! Interactive client for the agent CLI
//!
//! [`Client`] owns the connection: the subprocess transport (or a caller
//! supplied one), the reader task that routes frames, and the pending table
//! correlating outbound control requests with their responses.
//!
//! Two modes exist. A single-shot connection feeds one prompt string to the
//! process and only consumes messages. A streaming connection keeps input
//! open, runs the initialize handshake, and may issue control requests
//! (interrupt, model and permission-mode changes) while messages flow.

use crate::command::{Prompt, build_command, build_env, resolve_cli};
use crate::error::{AgentError, Result};
use crate::hooks::{HookCallback, build_hooks_config};
use crate::options::AgentOptions;
use crate::router::{
    ControlOutcome, InboundCallbacks, Pending, PendingTable, RouterContext, run,
};
use claudepipe_protocol::Message;
use claudepipe_protocol::permissions::PermissionMode;
use claudepipe_transport::{ProcessConfig, StdinMode, SubprocessTransport, Transport};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(60);
const INITIALIZE_TIMEOUT_FLOOR: Duration = Duration::from_secs(60);

/// Name of the environment variable overriding the initialize deadline, in
/// milliseconds.
const STREAM_CLOSE_TIMEOUT_ENV: &str = "CLAUDE_CODE_STREAM_CLOSE_TIMEOUT";

struct Connection {
    transport: Arc<dyn Transport>,
    ctx: Arc<RouterContext>,
    messages: mpsc::UnboundedReceiver<Result<Value>>,
    reader: JoinHandle<()>,
    streaming: bool,
    request_counter: AtomicU64,
    hooks_config: Option<Value>,
}

/// Interactive connection to the agent CLI.
pub struct Client {
    options: AgentOptions,
    custom_transport: Option<Arc<dyn Transport>>,
    conn: Option<Connection>,
}

impl Client {
    /// Create an unconnected client.
    pub fn new(options: AgentOptions) -> Self {
        Self {
            options,
            custom_transport: None,
            conn: None,
        }
    }

    /// Create a client over a caller-supplied transport instead of spawning
    /// the CLI. The transport must already be connected.
    pub fn with_transport(options: AgentOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            options,
            custom_transport: Some(transport),
            conn: None,
        }
    }

    /// Connect to the CLI.
    ///
    /// `Some(Prompt::Text(_))` starts a single-shot run; anything else is a
    /// streaming connection: the initialize handshake runs, then any
    /// `Prompt::Messages` are written. When the options carry no
    /// inbound-control callbacks, input closes right after the streamed
    /// prompt; otherwise it stays open (closing on the first `result`) so
    /// the CLI can still reach the callbacks.
    pub async fn connect(&mut self, prompt: Option<Prompt>) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            teardown(conn).await;
        }

        let streaming = !matches!(&prompt, Some(Prompt::Text(_)));
        let mut options = self.options.clone();

        if options.can_use_tool.is_some() {
            if !streaming {
                return Err(AgentError::Usage(
                    "can_use_tool requires streaming mode (message prompt)".to_string(),
                ));
            }
            if options.permission_prompt_tool_name.is_some() {
                return Err(AgentError::Usage(
                    "can_use_tool cannot be used with permission_prompt_tool_name".to_string(),
                ));
            }
            // Permission prompts are answered over this stdio connection.
            options.permission_prompt_tool_name = Some("stdio".to_string());
        }

        let transport: Arc<dyn Transport> = match &self.custom_transport {
            Some(transport) => Arc::clone(transport),
            None => {
                let cli = resolve_cli(&options)?;
                let single_shot_prompt = match &prompt {
                    Some(Prompt::Text(text)) => Some(text.clone()),
                    _ => None,
                };
                let mut config = ProcessConfig::new(cli.display().to_string())
                    .with_args(build_command(&options, single_shot_prompt.as_deref()));
                config.env = build_env(&options);
                config.cwd = options.cwd.clone();
                if let Some(max) = options.max_buffer_size {
                    config.max_buffer_size = max;
                }
                let stdin = match single_shot_prompt {
                    Some(text) => StdinMode::SingleShot(text),
                    None => StdinMode::Streaming,
                };
                Arc::new(SubprocessTransport::spawn(config, stdin)?)
            }
        };

        let mut hook_registry: HashMap<String, Arc<HookCallback>> = HashMap::new();
        let hooks_config = build_hooks_config(&options.hooks, &mut hook_registry);

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(RouterContext {
            transport: Arc::clone(&transport),
            pending: Arc::clone(&pending),
            callbacks: InboundCallbacks {
                can_use_tool: options.can_use_tool.clone(),
                hooks: hook_registry,
                mcp_message_handler: options.mcp_message_handler.clone(),
                sdk_mcp_servers: options.sdk_mcp_servers(),
            },
            close_input_on_first_result: AtomicBool::new(false),
        });
        let reader = tokio::spawn(run(Arc::clone(&ctx), messages_tx));

        self.conn = Some(Connection {
            transport,
            ctx,
            messages: messages_rx,
            reader,
            streaming,
            request_counter: AtomicU64::new(0),
            hooks_config,
        });

        if streaming {
            self.initialize().await?;
        }

        if let Some(Prompt::Messages(messages)) = prompt {
            self.stream_input(messages, options.has_control_callbacks())
                .await?;
        }

        Ok(())
    }

    async fn stream_input(&self, messages: Vec<Value>, has_callbacks: bool) -> Result<()> {
        let conn = self.connection()?;
        // Arm before writing so a fast first result cannot race the flag.
        conn.ctx
            .close_input_on_first_result
            .store(has_callbacks, Ordering::SeqCst);

        for message in &messages {
            conn.transport.write(message).await?;
        }

        if !has_callbacks {
            conn.transport.close_input().await;
        }
        Ok(())
    }

    /// Pull the next ordinary message, or `None` at end of stream.
    ///
    /// Control traffic never appears here; a fatal framing or process-exit
    /// error is returned once, ending the stream.
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(not_connected)?;
        match conn.messages.recv().await {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(Message::parse(frame)?)),
            Some(Err(e)) => Err(e),
        }
    }

    /// Collect messages through the first `result` message, inclusive.
    pub async fn receive_response(&mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await? {
            let is_result = matches!(message, Message::Result(_));
            messages.push(message);
            if is_result {
                break;
            }
        }
        Ok(messages)
    }

    /// Send a user prompt in the default session.
    pub async fn query(&self, prompt: impl Into<String>) -> Result<()> {
        self.query_in_session(prompt, "default").await
    }

    /// Send a user prompt in a specific session.
    pub async fn query_in_session(
        &self,
        prompt: impl Into<String>,
        session_id: &str,
    ) -> Result<()> {
        let conn = self.connection()?;
        let frame = json!({
            "type": "user",
            "message": {"role": "user", "content": prompt.into()},
            "parent_tool_use_id": null,
            "session_id": session_id,
        });
        conn.transport.write(&frame).await?;
        Ok(())
    }

    /// Forward caller-built message frames, stamping `session_id` where it is
    /// missing.
    pub async fn query_messages(&self, messages: Vec<Value>, session_id: &str) -> Result<()> {
        let conn = self.connection()?;
        for mut message in messages {
            if let Some(object) = message.as_object_mut() {
                if !object.contains_key("session_id") {
                    object.insert("session_id".to_string(), json!(session_id));
                }
            }
            conn.transport.write(&message).await?;
        }
        Ok(())
    }

    /// Run the initialize handshake, registering the hook configuration.
    ///
    /// Returns `None` on non-streaming connections, where no control protocol
    /// exists.
    pub async fn initialize(&self) -> Result<Option<Value>> {
        let conn = self.connection()?;
        if !conn.streaming {
            return Ok(None);
        }
        let request = json!({
            "subtype": "initialize",
            "hooks": conn.hooks_config.clone(),
        });
        let response = self
            .send_control_request(request, Some(self.initialize_timeout()))
            .await?;
        Ok(Some(response))
    }

    /// Interrupt the in-flight turn.
    pub async fn interrupt(&self) -> Result<()> {
        self.send_control_request(json!({"subtype": "interrupt"}), None)
            .await?;
        Ok(())
    }

    /// Switch the permission mode for the rest of the session.
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.send_control_request(
            json!({"subtype": "set_permission_mode", "mode": mode.as_str()}),
            None,
        )
        .await?;
        Ok(())
    }

    /// Switch models; `None` restores the default.
    pub async fn set_model(&self, model: Option<&str>) -> Result<()> {
        self.send_control_request(json!({"subtype": "set_model", "model": model}), None)
            .await?;
        Ok(())
    }

    /// Fetch the CLI's MCP server status.
    pub async fn mcp_status(&self) -> Result<Value> {
        self.send_control_request(json!({"subtype": "mcp_status"}), None)
            .await
    }

    /// Rewind checkpointed files to the state at a given user message.
    pub async fn rewind_files(&self, user_message_id: &str) -> Result<()> {
        self.send_control_request(
            json!({"subtype": "rewind_files", "user_message_id": user_message_id}),
            None,
        )
        .await?;
        Ok(())
    }

    /// Signal end-of-input while the process keeps running.
    pub async fn close_input(&self) -> Result<()> {
        self.connection()?.transport.close_input().await;
        Ok(())
    }

    /// Tear the connection down: kill the process, stop the reader, and fail
    /// anything still pending. Safe to call when already closed.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            teardown(conn).await;
        }
    }

    /// Whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(not_connected)
    }

    /// Issue one control request and block until its response, a reported
    /// remote error, or the deadline.
    ///
    /// Legal only on streaming connections; single-shot mode fails here
    /// before anything is written.
    async fn send_control_request(
        &self,
        request: Value,
        timeout_override: Option<Duration>,
    ) -> Result<Value> {
        let conn = self.connection()?;
        if !conn.streaming {
            return Err(AgentError::Usage(
                "Control requests require streaming mode".to_string(),
            ));
        }

        let subtype = request
            .get("subtype")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let sequence = conn.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let request_id = format!("req_{sequence}_{}", short_token());

        // Register (or claim an early arrival) before writing, so the reader
        // task can never observe the response first.
        let waiter = {
            let mut pending = conn.ctx.pending.lock().await;
            match pending.remove(&request_id) {
                Some(Pending::Early(outcome)) => return finish_control(outcome),
                Some(Pending::Waiting(_)) => {
                    // A stale waiter under a fresh id means the id scheme
                    // broke; replace it.
                    warn!(%request_id, "replacing stale pending control entry");
                    let (tx, rx) = oneshot::channel();
                    pending.insert(request_id.clone(), Pending::Waiting(tx));
                    rx
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    pending.insert(request_id.clone(), Pending::Waiting(tx));
                    rx
                }
            }
        };

        let frame = json!({
            "type": "control_request",
            "request_id": request_id,
            "request": request,
        });
        conn.transport.write(&frame).await?;

        let timeout = timeout_override
            .or(self.options.control_request_timeout)
            .unwrap_or(DEFAULT_CONTROL_TIMEOUT);

        match tokio::time::timeout(timeout, waiter).await {
            Ok(Ok(outcome)) => finish_control(outcome),
            Ok(Err(_closed)) => Err(AgentError::ConnectionClosed),
            Err(_elapsed) => {
                // Drop the stale slot; a response arriving later becomes an
                // unclaimed early entry and is discarded with the table.
                conn.ctx.pending.lock().await.remove(&request_id);
                debug!(%request_id, %subtype, "control request timed out");
                Err(AgentError::ControlTimeout { subtype })
            }
        }
    }

    fn initialize_timeout(&self) -> Duration {
        let configured = self.options.initialize_timeout.or_else(|| {
            std::env::var(STREAM_CLOSE_TIMEOUT_ENV)
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
        });
        match configured {
            Some(timeout) => timeout.max(INITIALIZE_TIMEOUT_FLOOR),
            None => INITIALIZE_TIMEOUT_FLOOR,
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.reader.abort();
        }
    }
}

async fn teardown(conn: Connection) {
    conn.transport.close().await;
    conn.reader.abort();
    // Dropping the table entries fails any caller still waiting.
    conn.ctx.pending.lock().await.clear();
}

fn finish_control(outcome: ControlOutcome) -> Result<Value> {
    match outcome {
        ControlOutcome::Success(payload) => Ok(payload),
        ControlOutcome::Error(message) => Err(AgentError::ControlRequest(message)),
    }
}

fn not_connected() -> AgentError {
    AgentError::Usage("Not connected. Call connect() first".to_string())
}

fn short_token() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
