//! Blocking and streamed chat against a local Ollama server.
//!
//! cargo run -p openai-client --example chat

use futures::StreamExt;
use openai_client::{ChatRequest, Message, OpenAIClient};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = OpenAIClient::new("ollama").with_base_url("http://localhost:11434/v1");

    let request = ChatRequest::new("llama3.2")
        .message(Message::system("You are a concise assistant."))
        .message(Message::user("What is Rust in one sentence?"));

    let response = client.chat_completion(request.clone()).await?;
    println!("{}\n", response.content);

    let mut stream = client.chat_completion_stream(request).await?;
    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?.delta);
        std::io::stdout().flush()?;
    }
    println!();

    Ok(())
}
