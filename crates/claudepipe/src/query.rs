//! One-shot queries
//!
//! The convenience path for callers that need a single prompt answered and no
//! runtime control: spawn, drain every message, close.

use crate::client::Client;
use crate::command::Prompt;
use crate::error::Result;
use crate::options::AgentOptions;
use claudepipe_protocol::Message;

/// Run one prompt to completion and collect every message the CLI produced.
///
/// Uses single-shot mode: the control protocol is unavailable and input
/// closes as soon as the prompt is written.
pub async fn query(prompt: impl Into<String>, options: AgentOptions) -> Result<Vec<Message>> {
    let mut client = Client::new(options);
    client.connect(Some(Prompt::Text(prompt.into()))).await?;

    let mut messages = Vec::new();
    let result = loop {
        match client.next_message().await {
            Ok(Some(message)) => messages.push(message),
            Ok(None) => break Ok(messages),
            Err(e) => break Err(e),
        }
    };
    client.close().await;
    result
}
