//! Company brochure generator.
//!
//! Fetches a company's landing page, asks a chat model which of its links
//! are worth reading (About, Careers, ...), fetches those, and asks the model
//! to write a markdown brochure from the combined text.
//!
//! ```rust,ignore
//! use brochure_generator::{BrochureGenerator, Config};
//!
//! let config = Config::from_env()?;
//! let generator = BrochureGenerator::new(&config)?;
//! let markdown = generator.generate("Acme", "https://acme.example", "English").await?;
//! ```
//!
//! The chat model and the page fetcher sit behind the [`ChatModel`] and
//! [`PageFetcher`] traits; [`testing`] has in-memory versions of both.

pub mod composer;
pub mod config;
pub mod error;
pub mod generator;
pub mod links;
pub mod model;
pub mod testing;
pub mod website;

pub use composer::{collect_stream, BrochureComposer, BrochureRequest, CONTENT_CHAR_LIMIT};
pub use config::{Backend, Config};
pub use error::{BrochureError, Result};
pub use generator::{
    brochure_file_name, save_brochure, BrochureGenerator, GatheredContent, ResponseMode,
    PAGE_TEXT_LIMIT,
};
pub use links::{RelevanceClassifier, RelevantLink, RelevantLinks};
pub use model::{ChatModel, TextStream};
pub use website::{HttpPageFetcher, Page, PageFetcher};
