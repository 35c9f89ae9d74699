//! Page fetching and HTML text extraction.
//!
//! Uses reqwest for the single GET and scraper for parsing. A page that
//! cannot be fetched is not an error: it comes back as [`Page::unreachable`]
//! and contributes nothing to the brochure.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{BrochureError, Result};

/// Browser-like User-Agent; some sites refuse obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

/// Title used when the document has no `<title>` element.
pub const NO_TITLE: &str = "No title found";

/// Elements whose subtrees never contribute visible text.
const STRIPPED_ELEMENTS: [&str; 4] = ["script", "style", "img", "input"];

/// One fetch attempt. `url` is `None` when the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    pub url: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub links: Vec<String>,
}

impl Page {
    /// The empty page produced by a failed fetch.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Parse a fetched document.
    pub fn from_html(url: impl Into<String>, html: &str, text_limit: Option<usize>) -> Self {
        let document = Html::parse_document(html);

        Self {
            url: Some(url.into()),
            title: extract_title(&document),
            text: Some(extract_text(&document, text_limit)),
            links: extract_links(&document),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.url.is_some()
    }

    /// Title and text formatted for the brochure prompt; empty when the page
    /// has neither.
    pub fn contents(&self) -> String {
        let title = self.title.as_deref().filter(|t| !t.is_empty());
        let text = self.text.as_deref().unwrap_or_default();

        match title {
            None if text.is_empty() => String::new(),
            Some(title) => format!("Webpage Title:\n{title}\nWebpage Contents:\n{text}\n\n"),
            None => format!("Webpage Contents:\n{text}\n\n"),
        }
    }
}

/// Text of the first `<title>`, trimmed.
///
/// A missing element yields [`NO_TITLE`]; an empty one yields `None`.
pub fn extract_title(document: &Html) -> Option<String> {
    let Ok(selector) = Selector::parse("title") else {
        return None;
    };

    match document.select(&selector).next() {
        Some(title) => {
            let text = title.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        None => Some(NO_TITLE.to_string()),
    }
}

/// Visible body text, one trimmed text node per line, truncated to `limit`
/// characters when given.
pub fn extract_text(document: &Html, limit: Option<usize>) -> String {
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&selector).next() else {
        return String::new();
    };

    let mut blocks = Vec::new();
    collect_text(body, &mut blocks);
    let text = blocks.join("\n");

    match limit {
        Some(limit) => truncate_chars(&text, limit).to_string(),
        None => text,
    }
}

fn collect_text<'a>(element: ElementRef<'a>, blocks: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    blocks.push(trimmed);
                }
            }
            Node::Element(el) if STRIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, blocks);
                }
            }
            _ => {}
        }
    }
}

/// Every non-empty `href` on an `<a>`, in document order, as written.
pub fn extract_links(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `limit` characters of `text`. May cut mid-word.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and parse `url`. Never fails; see [`Page::unreachable`].
    async fn fetch(&self, url: &str, text_limit: Option<usize>) -> Page;
}

/// One plain GET per page, no retries.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BrochureError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let header_charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_type_charset);
        let body = response.bytes().await.map_err(|e| e.to_string())?;

        Ok(decode_html(&body, header_charset.as_deref()))
    }
}

/// Decode an HTML body. The header charset wins, then a `charset=` declared
/// in the first 1024 bytes, then UTF-8. A byte order mark overrides all of
/// them. Invalid sequences become U+FFFD.
pub fn decode_html(body: &[u8], header_charset: Option<&str>) -> String {
    let encoding = header_charset
        .map(str::to_string)
        .or_else(|| meta_charset(body))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn content_type_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
            .filter(|v| !v.is_empty())
    })
}

/// `<meta charset=..>` or `<meta http-equiv .. content="..; charset=..">`.
fn meta_charset(body: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&body[..body.len().min(1024)]).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();

    let label: String = head[start..]
        .trim_start_matches(['"', '\'', ' '])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();

    (!label.is_empty()).then_some(label)
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, text_limit: Option<usize>) -> Page {
        debug!(url = %url, "Fetching page");

        match self.fetch_html(url).await {
            Ok(html) => {
                let page = Page::from_html(url, &html, text_limit);
                debug!(
                    url = %url,
                    text_chars = page.text.as_deref().map(|t| t.chars().count()),
                    links = page.links.len(),
                    "Page fetched"
                );
                page
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Error fetching page");
                Page::unreachable()
            }
        }
    }
}
