//! Hooks: observe and steer tool use from the host process.
//!
//! Run with: `cargo run --example with_hooks`

use claudepipe::{AgentOptions, Client, HookMatcher, HookOutput};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = AgentOptions::new().with_hooks(
        "PreToolUse",
        [
            HookMatcher::for_tool("Bash").with_callback(|input, tool_use_id, _context| async move {
                println!("about to run bash ({tool_use_id:?}): {input}");
                Ok(HookOutput::new()
                    .with_continue(true)
                    .with_field("systemMessage", json!("bash use was logged")))
            }),
        ],
    );

    let mut client = Client::new(options);
    client.connect(None).await?;

    client.query("Show the current git status").await?;
    for message in client.receive_response().await? {
        println!("{}", message.message_type());
    }

    client.close().await;
    Ok(())
}
