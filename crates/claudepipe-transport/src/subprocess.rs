//! Agent CLI subprocess transport
//!
//! Spawns the CLI with a precomputed argument vector, wires its stdout into
//! the [`LineFramer`], and runs a writer task that feeds stdin from an
//! in-process channel so outbound writes never block the read pump. Closing
//! input (dropping the channel sender) is decoupled from killing the process:
//! the CLI keeps emitting output after its stdin reaches EOF.

use crate::error::{Result, TransportError};
use crate::framer::{DEFAULT_MAX_BUFFER_SIZE, LineFramer};
use crate::traits::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// Configuration for spawning the agent CLI process.
///
/// The argument vector is precomputed by the caller; this layer does not know
/// how options map to flags.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Resolved path of the CLI executable.
    pub program: String,
    /// Arguments to pass to the CLI.
    pub args: Vec<String>,
    /// Environment overrides, merged over the parent environment.
    pub env: HashMap<String, String>,
    /// Working directory for the process, when set.
    pub cwd: Option<PathBuf>,
    /// Cap on buffered output bytes awaiting a newline.
    pub max_buffer_size: usize,
}

impl ProcessConfig {
    /// Create a configuration for the given executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Append one argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Override the output buffer cap.
    pub fn with_max_buffer_size(mut self, max: usize) -> Self {
        self.max_buffer_size = max;
        self
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("claude")
    }
}

/// What the process receives on stdin.
#[derive(Clone, Debug)]
pub enum StdinMode {
    /// Single-shot: the complete prompt is written at spawn, then stdin
    /// closes. No input channel stays open.
    SingleShot(String),
    /// Streaming: stdin stays open and is fed by [`SubprocessTransport::write`]
    /// until input is closed.
    Streaming,
}

enum ReadState {
    /// Pumping stdout chunks through the framer.
    Reading(ChildStdout),
    /// Output hit EOF; the exit status has not been checked yet.
    Draining,
    /// The sequence has ended, cleanly or with an error.
    Done,
}

struct Reader {
    framer: LineFramer,
    state: ReadState,
}

/// Transport over a spawned agent CLI process.
pub struct SubprocessTransport {
    child: Mutex<Child>,
    stdin_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reader: Mutex<Reader>,
}

impl SubprocessTransport {
    /// Spawn the process and wire up both stream pumps.
    ///
    /// Fails with [`TransportError::CliNotFound`] when the executable does
    /// not exist and [`TransportError::Spawn`] for any other start failure.
    pub fn spawn(config: ProcessConfig, input: StdinMode) -> Result<Self> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::CliNotFound(config.program.clone())
            } else {
                TransportError::Spawn(e.to_string())
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("failed to get stdout".to_string()))?;

        let stdin_tx = match input {
            StdinMode::SingleShot(prompt) => {
                tokio::spawn(async move {
                    let mut stdin = stdin;
                    if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                        debug!(error = %e, "failed to write one-shot prompt");
                    }
                    let _ = stdin.shutdown().await;
                });
                None
            }
            StdinMode::Streaming => {
                let (tx, rx) = mpsc::unbounded_channel::<String>();
                tokio::spawn(write_loop(stdin, rx));
                Some(tx)
            }
        };

        Ok(Self {
            child: Mutex::new(child),
            stdin_tx: Mutex::new(stdin_tx),
            reader: Mutex::new(Reader {
                framer: LineFramer::new(config.max_buffer_size),
                state: ReadState::Reading(stdout),
            }),
        })
    }

    async fn finish(&self, reader: &mut Reader) -> Result<Option<Value>> {
        reader.state = ReadState::Done;
        let status = self.child.lock().await.wait().await?;
        if status.success() {
            Ok(None)
        } else {
            Err(TransportError::ProcessExit {
                code: status.code().unwrap_or(1),
            })
        }
    }
}

async fn write_loop(
    stdin: tokio::process::ChildStdin,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut stdin = BufWriter::new(stdin);
    while let Some(line) = rx.recv().await {
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(e) = write.await {
            warn!(error = %e, "stdin write failed; dropping remaining input");
            break;
        }
    }
    // Channel closed (input close) or write failure: EOF the child's stdin.
    let _ = stdin.shutdown().await;
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn write(&self, frame: &Value) -> Result<()> {
        let guard = self.stdin_tx.lock().await;
        let Some(tx) = guard.as_ref() else {
            // Input closed (or single-shot): writes are silently dropped.
            return Ok(());
        };
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        if tx.send(line).is_err() {
            debug!("write after writer task exit; frame dropped");
        }
        Ok(())
    }

    async fn next_frame(&self) -> Result<Option<Value>> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.framer.next_frame() {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(e) => {
                    reader.state = ReadState::Done;
                    return Err(e);
                }
            }

            match &mut reader.state {
                ReadState::Done => return Ok(None),
                ReadState::Draining => {
                    // Residue was flushed on the previous call; only the exit
                    // status is left to report.
                    return self.finish(&mut reader).await;
                }
                ReadState::Reading(stdout) => {
                    let mut chunk = [0u8; 8192];
                    let n = match stdout.read(&mut chunk).await {
                        Ok(n) => n,
                        Err(e) => {
                            reader.state = ReadState::Done;
                            return Err(e.into());
                        }
                    };
                    if n == 0 {
                        reader.state = ReadState::Draining;
                        match reader.framer.flush() {
                            Ok(Some(frame)) => return Ok(Some(frame)),
                            Ok(None) => return self.finish(&mut reader).await,
                            Err(e) => {
                                reader.state = ReadState::Done;
                                return Err(e);
                            }
                        }
                    }
                    reader.framer.feed(&chunk[..n]);
                }
            }
        }
    }

    async fn close_input(&self) {
        // Dropping the sender lets the writer task drain queued frames and
        // then EOF the child's stdin.
        self.stdin_tx.lock().await.take();
    }

    async fn close(&self) {
        self.close_input().await;
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "kill on closed process ignored");
        }
        let _ = child.wait().await;
    }
}
