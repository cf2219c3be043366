//! Permission callback: decide tool-by-tool what the agent may run.
//!
//! Run with: `cargo run --example with_permissions`

use claudepipe::{AgentOptions, Client, Message, PermissionResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = AgentOptions::new().with_can_use_tool(|tool_name, input, _context| async move {
        println!("permission check: {tool_name} {input}");
        if tool_name == "Bash" {
            Ok(PermissionResult::deny("shell access is disabled here"))
        } else {
            Ok(PermissionResult::allow())
        }
    });

    let mut client = Client::new(options);
    client.connect(None).await?;

    client.query("List the files in the current directory").await?;
    for message in client.receive_response().await? {
        if let Message::Result(result) = &message {
            println!("done, is_error={}", result.is_error);
        }
    }

    client.close().await;
    Ok(())
}
