//! Relevant-link selection.
//!
//! One model call turns the raw link list of the landing page into the subset
//! worth reading for a brochure (About, Careers, ...).

use openai_client::{strip_code_blocks, ChatRequest, Message, ResponseFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::model::ChatModel;
use crate::website::Page;

const LINK_SYSTEM_PROMPT: &str = r#"You are an expert web content analyzer. You are given the list of links found on a company webpage. Identify the links most relevant for a brochure about the company, such as the About page, Company page, or Careers/Jobs pages. Return only the links, without any additional commentary.

Respond with JSON in exactly this shape:
{
  "relevant_links": [
    {"type": "About page", "url": "https://example.com/about"},
    {"type": "Careers page", "url": "https://example.com/careers"}
  ]
}"#;

/// Model verdict on which links to follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelevantLinks {
    pub relevant_links: Vec<RelevantLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelevantLink {
    /// Kind of page, e.g. "About page"
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl RelevantLink {
    /// The URL, if the model supplied a non-empty one.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

impl RelevantLinks {
    /// Parse a model reply. Anything that is not the expected JSON shape
    /// yields no links.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw)
            .or_else(|_| serde_json::from_str(strip_code_blocks(raw)))
            .unwrap_or_else(|e| {
                warn!(error = %e, response = %raw, "Error decoding relevant links response");
                Self::default()
            })
    }
}

pub struct RelevanceClassifier {
    model: Arc<dyn ChatModel>,
    model_name: String,
    backend: Backend,
}

impl RelevanceClassifier {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            model_name: config.link_model.clone(),
            backend: config.backend,
        }
    }

    /// The chat request sent for `page`.
    pub fn request(&self, page: &Page) -> ChatRequest {
        // Ollama understands json_object but not strict schemas.
        let format = match self.backend {
            Backend::Api => ResponseFormat::json_schema::<RelevantLinks>(),
            Backend::Ollama => ResponseFormat::json_object(),
        };

        ChatRequest::new(&self.model_name)
            .message(Message::system(LINK_SYSTEM_PROMPT))
            .message(Message::user(user_prompt(page)))
            .response_format(format)
    }

    /// Ask the model which of the page's links belong in a brochure.
    pub async fn classify(&self, page: &Page) -> Result<RelevantLinks> {
        debug!(
            model = %self.model_name,
            url = page.url.as_deref().unwrap_or_default(),
            link_count = page.links.len(),
            "Classifying links"
        );

        let reply = self.model.complete(self.request(page)).await?;
        let links = RelevantLinks::parse(&reply);

        debug!(relevant = links.relevant_links.len(), "Links classified");
        Ok(links)
    }
}

fn user_prompt(page: &Page) -> String {
    format!(
        "Here is the URL of the webpage: {url}\n\
         Analyze the links on this page and identify those most relevant for inclusion in a company brochure.\n\
         Return the relevant links in the specified JSON format.\n\
         Do not include Terms of Service, Privacy Policy, email links, or any other unrelated links.\n\
         Links:\n{links}",
        url = page.url.as_deref().unwrap_or_default(),
        links = page.links.join("\n"),
    )
}
