//! Chat completion request and response types.

use serde::{Deserialize, Serialize};

use crate::schema::StructuredOutput;

// =============================================================================
// Requests
// =============================================================================

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-4.1-mini", "llama3.2")
    pub model: String,

    /// Conversation messages, in order
    pub messages: Vec<Message>,

    /// Structured-output hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,

    /// Set by the client when a streamed reply is requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) stream: Option<bool>,
}

impl ChatRequest {
    /// Create an empty request for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            response_format: None,
            stream: None,
        }
    }

    /// Append a message.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Ask the server to constrain the reply format.
    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// `response_format` field of a chat request.
///
/// `JsonObject` only promises syntactically valid JSON and is understood by
/// Ollama's OpenAI-compatible endpoint. `JsonSchema` asks for strict
/// conformance to a schema.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
    JsonSchema { json_schema: JsonSchemaFormat },
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self::JsonObject
    }

    /// Strict JSON schema generated from `T`.
    pub fn json_schema<T: StructuredOutput>() -> Self {
        Self::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: T::type_name(),
                strict: true,
                schema: T::openai_schema(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

// =============================================================================
// Responses
// =============================================================================

/// Chat completion reply.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Text of the first choice (empty when the server sent `null`)
    pub content: String,

    /// Token usage, when reported
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// =============================================================================
// Utilities
// =============================================================================

/// Strip a surrounding markdown code fence from a model reply.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
