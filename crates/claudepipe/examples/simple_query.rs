//! One-shot query: spawn the CLI, collect every message, print the text.
//!
//! Run with: `cargo run --example simple_query`

use claudepipe::{AgentOptions, ContentBlock, Message, query};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let messages = query("What is 2 + 2?", AgentOptions::new()).await?;

    for message in messages {
        match message {
            Message::Assistant(assistant) => {
                for block in assistant.content {
                    if let ContentBlock::Text { text } = block {
                        println!("{text}");
                    }
                }
            }
            Message::Result(result) => {
                println!(
                    "turn finished in {} ms (cost: {:?} USD)",
                    result.duration_ms, result.total_cost_usd
                );
            }
            _ => {}
        }
    }

    Ok(())
}
