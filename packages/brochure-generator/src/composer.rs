//! Brochure writing.

use futures::TryStreamExt;
use openai_client::{ChatRequest, Message};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::{ChatModel, TextStream};
use crate::website::truncate_chars;

/// Maximum characters of aggregated content placed in the prompt.
pub const CONTENT_CHAR_LIMIT: usize = 5000;

const BROCHURE_SYSTEM_PROMPT: &str = r#"You are a skilled brochure writer. Create a compelling, professional brochure for a company from the webpage content you are given. Highlight the company's strengths, values, and offerings in an engaging but factual tone aimed at prospective customers, investors, and recruits.

Formatting rules:
- Respond in markdown without code blocks and without raw HTML.
- Use a single level-1 heading with the company name, level-2 headings for sections and level-3 headings only when a section needs subsections.
- Prefer short paragraphs and bullet lists; use **bold** for key terms sparingly.
- Do not invent statistics, awards, certifications, customers, or dates that are not in the content.
- When information for a section is missing, keep the section short and neutral instead of guessing.

Use these sections, in this order:
## Overview
## Website
## Key Strengths
## Products/Services
## Technology/Innovation
## Contact & Social Links"#;

/// Everything the composer needs for one brochure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrochureRequest {
    pub company_name: String,
    pub aggregated_content: String,
    pub language: String,
}

impl BrochureRequest {
    pub fn new(
        company_name: impl Into<String>,
        aggregated_content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            aggregated_content: aggregated_content.into(),
            language: language.into(),
        }
    }

    /// Instructions followed by at most [`CONTENT_CHAR_LIMIT`] characters of
    /// content.
    pub fn user_prompt(&self) -> String {
        format!(
            "You are to create a brochure for {company}.\n\
             Using the following webpage content and relevant links, create a short brochure of the company \
             in {language}, in well-structured markdown without code blocks.\n\
             \n{content}",
            company = self.company_name,
            language = self.language,
            content = truncate_chars(&self.aggregated_content, CONTENT_CHAR_LIMIT),
        )
    }
}

pub struct BrochureComposer {
    model: Arc<dyn ChatModel>,
    model_name: String,
}

impl BrochureComposer {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            model,
            model_name: config.brochure_model.clone(),
        }
    }

    pub fn request(&self, brochure: &BrochureRequest) -> ChatRequest {
        ChatRequest::new(&self.model_name)
            .message(Message::system(BROCHURE_SYSTEM_PROMPT))
            .message(Message::user(brochure.user_prompt()))
    }

    /// Write the brochure in one call.
    pub async fn compose(&self, brochure: &BrochureRequest) -> Result<String> {
        debug!(
            model = %self.model_name,
            company = %brochure.company_name,
            content_chars = brochure.aggregated_content.chars().count(),
            "Composing brochure"
        );

        self.model.complete(self.request(brochure)).await
    }

    /// Write the brochure as a stream of markdown fragments.
    pub async fn compose_stream(&self, brochure: &BrochureRequest) -> Result<TextStream> {
        debug!(
            model = %self.model_name,
            company = %brochure.company_name,
            "Streaming brochure"
        );

        self.model.complete_stream(self.request(brochure)).await
    }
}

/// Drain `stream` into one string, handing each fragment to `observer` as it
/// arrives. Stops at the first error.
pub async fn collect_stream(
    stream: TextStream,
    mut observer: impl FnMut(&str) + Send,
) -> Result<String> {
    stream
        .try_fold(String::new(), |mut text, fragment| {
            observer(&fragment);
            text.push_str(&fragment);
            futures::future::ready(Ok(text))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChatModel;
    use futures::stream::{self, StreamExt};
    use openai_client::OpenAIError;

    fn config() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_user_prompt_caps_content() {
        let content: String = ('a'..='z').cycle().take(8000).collect();
        let request = BrochureRequest::new("Acme", content.clone(), "French");

        let prompt = request.user_prompt();

        assert!(prompt.contains("brochure for Acme"));
        assert!(prompt.contains("in French"));
        assert!(prompt.ends_with(&content[..5000]));
        assert!(!prompt.contains(&content[..5001]));
    }

    #[test]
    fn test_user_prompt_keeps_short_content() {
        let request = BrochureRequest::new("Acme", "Webpage Contents:\nX\n\n", "English");

        assert!(request.user_prompt().ends_with("\n\nWebpage Contents:\nX\n\n"));
    }

    #[test]
    fn test_system_prompt_sections() {
        for section in [
            "Overview",
            "Website",
            "Key Strengths",
            "Products/Services",
            "Technology/Innovation",
            "Contact & Social Links",
        ] {
            assert!(BROCHURE_SYSTEM_PROMPT.contains(&format!("## {section}")));
        }
    }

    #[tokio::test]
    async fn test_compose_returns_reply_verbatim() {
        let model = Arc::new(MockChatModel::new().with_reply("# Acme\n\n## Overview\n"));
        let composer = BrochureComposer::new(model.clone(), &config());

        let text = composer
            .compose(&BrochureRequest::new("Acme", "content", "English"))
            .await
            .unwrap();

        assert_eq!(text, "# Acme\n\n## Overview\n");
        let requests = model.requests();
        assert_eq!(requests[0].model, "gpt-oss");
        assert!(requests[0].response_format.is_none());
    }

    #[tokio::test]
    async fn test_compose_error_propagates() {
        let model = Arc::new(MockChatModel::new().with_error("boom"));
        let composer = BrochureComposer::new(model, &config());

        let result = composer
            .compose(&BrochureRequest::new("Acme", "content", "English"))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_collect_stream_forwards_fragments() {
        let model = Arc::new(MockChatModel::new().with_fragments(["# Ac", "", "me", "\n"]));
        let composer = BrochureComposer::new(model, &config());
        let stream = composer
            .compose_stream(&BrochureRequest::new("Acme", "content", "English"))
            .await
            .unwrap();

        let mut seen = Vec::new();
        let text = collect_stream(stream, |fragment| seen.push(fragment.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "# Acme\n");
        assert_eq!(seen, vec!["# Ac", "", "me", "\n"]);
    }

    #[tokio::test]
    async fn test_collect_stream_stops_on_error() {
        let stream: TextStream = stream::iter(vec![
            Ok("partial".to_string()),
            Err(OpenAIError::Network("reset".into()).into()),
            Ok("never".to_string()),
        ])
        .boxed();

        let mut seen = 0;
        let result = collect_stream(stream, |_| seen += 1).await;

        assert!(result.is_err());
        assert_eq!(seen, 1);
    }
}
