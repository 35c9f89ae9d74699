//! SSE parsing for streamed chat completions.
//!
//! Lines are split on raw bytes before UTF-8 decoding, so a multi-byte
//! character cut across two network chunks decodes correctly.

use bytes::Bytes;
use futures::stream::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::OpenAIError;

/// One event of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionChunk {
    /// Text delta; empty when the event carried no content (role-only or
    /// finish events).
    pub delta: String,
    /// Set on the `[DONE]` terminator.
    pub done: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
    /// Servers report mid-stream failures as an `error` event
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceRaw {
    #[serde(default)]
    delta: Option<DeltaRaw>,
}

#[derive(Debug, Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Finite, single-pass stream of [`ChatCompletionChunk`]s read from an SSE body.
pub struct ChatCompletionStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    finished: bool,
}

impl ChatCompletionStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Pop complete lines off the buffer until one yields an event.
    fn next_event(&mut self) -> Option<Result<ChatCompletionChunk, OpenAIError>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                return Some(event);
            }
        }
        None
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<ChatCompletionChunk, OpenAIError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.next_event() {
                return Poll::Ready(Some(event));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(OpenAIError::Network(e.to_string()))));
                }
                Poll::Ready(None) => {
                    // Flush a trailing line that had no newline.
                    this.finished = true;
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Parse one SSE line. `None` for blank lines, comments and non-data fields.
fn parse_line(line: &[u8]) -> Option<Result<ChatCompletionChunk, OpenAIError>> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => {
            return Some(Err(OpenAIError::Parse(format!(
                "Invalid UTF-8 in stream: {}",
                e
            ))))
        }
    };

    let data = line.strip_prefix("data:")?.trim();

    if data == "[DONE]" {
        return Some(Ok(ChatCompletionChunk {
            delta: String::new(),
            done: true,
        }));
    }

    let chunk = serde_json::from_str::<StreamChunkRaw>(data)
        .map_err(|e| {
            let end = data
                .char_indices()
                .nth(200)
                .map(|(i, _)| i)
                .unwrap_or(data.len());
            OpenAIError::Parse(format!(
                "Failed to parse stream chunk: {} (data: {})",
                e,
                &data[..end]
            ))
        })
        .and_then(|raw| match raw.error {
            Some(error) => Err(OpenAIError::Model(error_message(&error))),
            None => Ok(ChatCompletionChunk {
                delta: raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta)
                    .and_then(|delta| delta.content)
                    .unwrap_or_default(),
                done: false,
            }),
        });

    Some(chunk)
}

/// `{"message": ..}` objects (OpenAI) or plain strings (Ollama).
fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn stream_of(parts: &[&[u8]]) -> ChatCompletionStream {
        let parts: Vec<Result<Bytes, reqwest::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        ChatCompletionStream::new(futures::stream::iter(parts))
    }

    async fn deltas(stream: ChatCompletionStream) -> Vec<ChatCompletionChunk> {
        stream.map(|c| c.unwrap()).collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn test_tokens_then_done() {
        let stream = stream_of(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
            b"data: [DONE]\n\n",
        ]);

        let chunks = deltas(stream).await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta, "Hello");
        assert_eq!(chunks[1].delta, " world");
        assert!(chunks[2].done);
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let stream = stream_of(&[
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"Hi\"}}]}\n",
            b"\ndata: [DONE]\n",
        ]);

        let chunks = deltas(stream).await;

        assert_eq!(chunks[0].delta, "Hi");
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Việt\"}}]}\n".as_bytes();
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let stream = stream_of(&[&line[..cut], &line[cut..]]);
        let chunks = deltas(stream).await;

        assert_eq!(chunks[0].delta, "Việt");
    }

    #[tokio::test]
    async fn test_missing_content_is_empty_delta() {
        let stream = stream_of(&[
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            b"data: {\"choices\":[]}\n",
        ]);

        let chunks = deltas(stream).await;

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.delta.is_empty() && !c.done));
    }

    #[tokio::test]
    async fn test_ignores_comments_and_other_fields() {
        let stream = stream_of(&[b": keep-alive\nevent: message\nid: 7\ndata: [DONE]\n"]);

        let chunks = deltas(stream).await;

        assert_eq!(chunks, vec![ChatCompletionChunk { delta: String::new(), done: true }]);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let stream = stream_of(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]);

        let chunks = deltas(stream).await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].delta, "end");
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_parse_error() {
        let mut stream = stream_of(&[b"data: {not json}\n"]);

        let err = stream.next().await.unwrap().unwrap_err();

        assert!(matches!(err, OpenAIError::Parse(_)));
    }

    #[tokio::test]
    async fn test_error_event_mid_stream_is_model_error() {
        let mut stream = stream_of(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"# Acme\"}}]}\n",
            b"data: {\"error\":{\"message\":\"The server had an error\"}}\n",
            b"data: [DONE]\n",
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap().delta, "# Acme");

        let err = stream.next().await.unwrap().unwrap_err();
        match err {
            OpenAIError::Model(message) => assert_eq!(message, "The server had an error"),
            other => panic!("expected Model error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_string_error_event() {
        let mut stream = stream_of(&[b"data: {\"error\":\"model not found\"}\n"]);

        let err = stream.next().await.unwrap().unwrap_err();

        assert!(matches!(err, OpenAIError::Model(ref m) if m == "model not found"));
        assert_eq!(err.status(), None);
    }
}
