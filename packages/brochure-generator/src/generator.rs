//! The end-to-end pipeline: fetch, classify, fetch again, compose.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::composer::{collect_stream, BrochureComposer, BrochureRequest};
use crate::config::Config;
use crate::error::Result;
use crate::links::RelevanceClassifier;
use crate::model::ChatModel;
use crate::website::{HttpPageFetcher, PageFetcher};

/// Characters of body text kept from each fetched page.
pub const PAGE_TEXT_LIMIT: usize = 2000;

/// How the composer's reply is received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Wait for the whole brochure
    #[default]
    Complete,
    /// Receive fragments as they are generated
    Stream,
}

/// Aggregated website text, plus how many relevant links went into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatheredContent {
    pub text: String,
    /// Linked pages requested, reachable or not
    pub links_fetched: usize,
    /// Relevant links dropped for having no URL
    pub links_skipped: usize,
}

pub struct BrochureGenerator {
    fetcher: Arc<dyn PageFetcher>,
    classifier: RelevanceClassifier,
    composer: BrochureComposer,
}

impl BrochureGenerator {
    /// Real HTTP fetcher and chat client for `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpPageFetcher::new()?);
        let model = Arc::new(config.client());
        Ok(Self::with_parts(fetcher, model, config))
    }

    pub fn with_parts(
        fetcher: Arc<dyn PageFetcher>,
        model: Arc<dyn ChatModel>,
        config: &Config,
    ) -> Self {
        Self {
            fetcher,
            classifier: RelevanceClassifier::new(model.clone(), config),
            composer: BrochureComposer::new(model, config),
        }
    }

    /// Text of the landing page followed by every relevant linked page.
    pub async fn gather_content(&self, url: &str) -> Result<GatheredContent> {
        let landing = self.fetcher.fetch(url, Some(PAGE_TEXT_LIMIT)).await;
        let relevant = self.classifier.classify(&landing).await?;

        let mut gathered = GatheredContent {
            text: landing.contents(),
            ..Default::default()
        };
        for link in &relevant.relevant_links {
            let Some(link_url) = link.url() else {
                debug!(kind = ?link.kind, "Skipping relevant link without URL");
                gathered.links_skipped += 1;
                continue;
            };

            let page = self.fetcher.fetch(link_url, Some(PAGE_TEXT_LIMIT)).await;
            gathered.links_fetched += 1;
            gathered.text.push_str(&page.contents());
        }

        info!(
            url = %url,
            links_fetched = gathered.links_fetched,
            links_skipped = gathered.links_skipped,
            content_chars = gathered.text.chars().count(),
            "Website content gathered"
        );
        Ok(gathered)
    }

    /// Generate a brochure and return its markdown.
    pub async fn generate(&self, company_name: &str, url: &str, language: &str) -> Result<String> {
        self.generate_with(company_name, url, language, ResponseMode::Complete, |_| {})
            .await
    }

    /// Generate a brochure, handing each fragment to `observer` as it
    /// arrives. In [`ResponseMode::Complete`] the observer sees the whole
    /// brochure once.
    pub async fn generate_with(
        &self,
        company_name: &str,
        url: &str,
        language: &str,
        mode: ResponseMode,
        mut observer: impl FnMut(&str) + Send,
    ) -> Result<String> {
        info!(company = %company_name, url = %url, language = %language, "Generating brochure");

        let content = self.gather_content(url).await?;
        let request = BrochureRequest::new(company_name, content.text, language);

        let brochure = match mode {
            ResponseMode::Complete => {
                let text = self.composer.compose(&request).await?;
                observer(&text);
                text
            }
            ResponseMode::Stream => {
                let stream = self.composer.compose_stream(&request).await?;
                collect_stream(stream, observer).await?
            }
        };

        info!(
            company = %company_name,
            brochure_chars = brochure.chars().count(),
            "Brochure generated"
        );
        Ok(brochure)
    }
}

/// `{company_name}_brochure.md`
pub fn brochure_file_name(company_name: &str) -> PathBuf {
    PathBuf::from(format!("{company_name}_brochure.md"))
}

/// Write the brochure as UTF-8, replacing any existing file.
pub fn save_brochure(path: impl AsRef<Path>, markdown: &str) -> Result<()> {
    std::fs::write(path, markdown)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brochure_file_name() {
        assert_eq!(brochure_file_name("Acme"), PathBuf::from("Acme_brochure.md"));
        assert_eq!(
            brochure_file_name("Hugging Face"),
            PathBuf::from("Hugging Face_brochure.md")
        );
    }

    #[test]
    fn test_save_brochure_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(brochure_file_name("Acme"));

        save_brochure(&path, "old").unwrap();
        save_brochure(&path, "# Acme\n\nCafé ☕\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Acme\n\nCafé ☕\n");
    }

    #[test]
    fn test_save_brochure_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("Acme_brochure.md");

        let err = save_brochure(&path, "x").unwrap_err();
        assert!(matches!(err, crate::error::BrochureError::Io(_)));
    }
}
