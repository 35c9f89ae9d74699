//! Testing utilities including mock implementations.
//!
//! These let the pipeline run without a model server or network access.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use openai_client::{ChatRequest, OpenAIError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{BrochureError, Result};
use crate::model::{ChatModel, TextStream};
use crate::website::{Page, PageFetcher};

/// Canned reply for one call to [`MockChatModel`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fragments(Vec<String>),
    Error(String),
}

/// A chat model that answers from a queue of canned replies.
///
/// Replies are consumed in call order. Once the queue is empty every call
/// returns an empty string.
#[derive(Default, Clone)]
pub struct MockChatModel {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a full reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()))
    }

    /// Queue a reply delivered as separate fragments when streamed.
    pub fn with_fragments<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockReply::Fragments(
            fragments.into_iter().map(Into::into).collect(),
        ))
    }

    /// Queue a transport failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(MockReply::Error(message.into()))
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn next_reply(&self, request: ChatRequest) -> MockReply {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockReply::Text(String::new()))
    }
}

fn model_error(message: String) -> BrochureError {
    BrochureError::Model(OpenAIError::Network(message))
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        match self.next_reply(request) {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(fragments) => Ok(fragments.concat()),
            MockReply::Error(message) => Err(model_error(message)),
        }
    }

    async fn complete_stream(&self, request: ChatRequest) -> Result<TextStream> {
        match self.next_reply(request) {
            MockReply::Text(text) => Ok(stream::iter(vec![Ok(text)]).boxed()),
            MockReply::Fragments(fragments) => {
                Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            MockReply::Error(message) => Err(model_error(message)),
        }
    }
}

/// A fetcher serving pages from memory.
///
/// URLs without a registered page behave like unreachable hosts.
#[derive(Default, Clone)]
pub struct MockPageFetcher {
    pages: Arc<Mutex<HashMap<String, String>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`. Parsing happens on fetch, so text limits apply.
    pub fn with_html(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.lock().unwrap().insert(url.into(), html.into());
        self
    }

    /// URLs requested so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str, text_limit: Option<usize>) -> Page {
        self.fetched.lock().unwrap().push(url.to_string());

        let html = self.pages.lock().unwrap().get(url).cloned();
        match html {
            Some(html) => Page::from_html(url, &html, text_limit),
            None => Page::unreachable(),
        }
    }
}
