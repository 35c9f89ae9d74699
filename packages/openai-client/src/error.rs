//! Error types for the chat client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpenAIError>;

#[derive(Debug, Error)]
pub enum OpenAIError {
    /// No response, or the body broke off mid-stream
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status
    #[error("HTTP {status} from chat endpoint: {body}")]
    Status { status: u16, body: String },

    /// A 2xx reply that reports a failure: an `error` event in a stream or
    /// a completion without choices
    #[error("Model error: {0}")]
    Model(String),

    /// Body that does not match the expected wire shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
