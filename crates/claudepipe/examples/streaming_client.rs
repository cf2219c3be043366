//! Streaming session: send follow-up prompts and interrupt mid-turn.
//!
//! Run with: `cargo run --example streaming_client`

use claudepipe::{AgentOptions, Client, Message, PermissionMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut client = Client::new(
        AgentOptions::new().with_permission_mode(PermissionMode::AcceptEdits),
    );
    client.connect(None).await?;

    client.query("Summarize the README in this directory").await?;
    for message in client.receive_response().await? {
        if let Message::Assistant(assistant) = &message {
            println!("assistant: {} block(s)", assistant.content.len());
        }
    }

    // The control protocol stays available between turns.
    client.set_model(Some("claude-haiku-4-5")).await?;
    client.query("Now give me a one-line version").await?;
    for message in client.receive_response().await? {
        println!("{}", message.message_type());
    }

    client.close().await;
    Ok(())
}
