//! Chat model seam.
//!
//! The pipeline only needs "send these messages, get text back" in two
//! flavors. [`OpenAIClient`] implements it for real traffic; tests use
//! [`crate::testing::MockChatModel`].

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use openai_client::{ChatRequest, OpenAIClient};

use crate::error::{BrochureError, Result};

/// Lazy, finite, single-pass sequence of text fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a request and wait for the full reply text.
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Send a request and receive the reply as it is generated.
    async fn complete_stream(&self, request: ChatRequest) -> Result<TextStream> {
        let text = self.complete(request).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        Ok(self.chat_completion(request).await?.content)
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<TextStream> {
        let chunks = self.chat_completion_stream(request).await?;

        Ok(chunks
            .try_take_while(|chunk| futures::future::ready(Ok(!chunk.done)))
            .map_ok(|chunk| chunk.delta)
            .map_err(BrochureError::from)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::collect_stream;
    use openai_client::{Message, OpenAIError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one chat request with a canned SSE body.
    async fn serve_sse(body: &'static str) -> (OpenAIClient, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                let complete = text.find("\r\n\r\n").is_some_and(|end| {
                    let length = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    request.len() >= end + 4 + length
                });
                if complete || n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        (OpenAIClient::new("ollama").with_base_url(base_url), handle)
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-oss").message(Message::user("Write a brochure"))
    }

    #[tokio::test]
    async fn test_stream_stops_at_done() {
        let (client, server) = serve_sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"# Acme\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\\n\"}}]}\n\n",
            "data: [DONE]\n\n",
        ))
        .await;

        let stream = client.complete_stream(request()).await.unwrap();
        let text = collect_stream(stream, |_| {}).await.unwrap();
        server.await.unwrap();

        assert_eq!(text, "# Acme\n");
    }

    #[tokio::test]
    async fn test_error_event_fails_the_brochure() {
        let (client, server) = serve_sse(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"# Acme\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"The server had an error\"}}\n\n",
            "data: [DONE]\n\n",
        ))
        .await;

        let stream = client.complete_stream(request()).await.unwrap();
        let mut seen = Vec::new();
        let result = collect_stream(stream, |f| seen.push(f.to_string())).await;
        server.await.unwrap();

        assert!(matches!(
            result,
            Err(BrochureError::Model(OpenAIError::Model(ref m))) if m == "The server had an error"
        ));
        assert_eq!(seen, vec!["# Acme"]);
    }
}
