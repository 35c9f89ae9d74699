//! Typed errors for the brochure pipeline.
//!
//! Fetch failures and malformed classifier replies are recovered where they
//! happen and never show up here.

use openai_client::OpenAIError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrochureError {
    /// Missing credentials or an unusable setting
    #[error("config error: {0}")]
    Config(String),

    /// Chat model call failed
    #[error("model error: {0}")]
    Model(#[from] OpenAIError),

    /// Writing the brochure failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrochureError>;
