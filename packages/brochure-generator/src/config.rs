use openai_client::OpenAIClient;
use std::env;

use crate::error::{BrochureError, Result};

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_OLLAMA_LINK_MODEL: &str = "llama3.2";
const DEFAULT_OLLAMA_BROCHURE_MODEL: &str = "gpt-oss";

/// Where chat requests go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted OpenAI API
    Api,
    /// Locally hosted Ollama server
    Ollama,
}

/// Settings resolved once at startup and handed to the pipeline components.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub api_key: String,
    pub base_url: String,
    /// Model used to pick relevant links
    pub link_model: String,
    /// Model used to write the brochure
    pub brochure_model: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let use_api = get("USE_API")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "t"))
            .unwrap_or(false);

        if use_api {
            let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
                BrochureError::Config("OPENAI_API_KEY must be set when USE_API is enabled".into())
            })?;

            Ok(Self {
                backend: Backend::Api,
                api_key,
                base_url: get_or("OPENAI_BASE_URL", DEFAULT_API_BASE_URL),
                link_model: get_or("API_GET_RELEVANT_LINK_MODEL", DEFAULT_API_MODEL),
                brochure_model: get_or("API_GENERATE_BROCHURE_MODEL", DEFAULT_API_MODEL),
            })
        } else {
            Ok(Self {
                backend: Backend::Ollama,
                // Ollama ignores the key but the header must be present.
                api_key: "ollama".to_string(),
                base_url: get_or("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
                link_model: get_or("OLLAMA_GET_RELEVANT_LINK_MODEL", DEFAULT_OLLAMA_LINK_MODEL),
                brochure_model: get_or(
                    "OLLAMA_GENERATE_BROCHURE_MODEL",
                    DEFAULT_OLLAMA_BROCHURE_MODEL,
                ),
            })
        }
    }

    /// Override the link-selection model.
    pub fn with_link_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.link_model = model;
        }
        self
    }

    /// Override the brochure-writing model.
    pub fn with_brochure_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.brochure_model = model;
        }
        self
    }

    /// Chat client for the configured backend.
    pub fn client(&self) -> OpenAIClient {
        OpenAIClient::new(&self.api_key).with_base_url(&self.base_url)
    }
}
