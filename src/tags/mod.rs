//! Prompt → tag extraction.
//!
//! Sources are tried in priority order; the first one producing at least one tag wins.
//! When every source fails or comes back empty the chain answers with [`DEFAULT_TAGS`],
//! so extraction itself never errors.

mod huggingface;
mod openai;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;

pub use huggingface::HuggingFaceTagSource;
pub use openai::OpenAiTagSource;

/// Upper bound on tags handed to discovery.
pub const MAX_TAGS: usize = 3;

/// Terminal fallback of the chain.
pub const DEFAULT_TAGS: [&str; 3] = ["pop", "indie", "chill"];

/// What a prompt was reduced to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub energy: Option<f32>,
}

impl Extraction {
    pub fn from_tags(tags: Vec<String>) -> Self {
        Self {
            tags,
            mood: None,
            energy: None,
        }
    }

    pub fn fallback() -> Self {
        Self::from_tags(DEFAULT_TAGS.iter().map(|t| t.to_string()).collect())
    }
}

/// A provider able to turn a prompt into tags.
///
/// `Ok(None)` means the provider answered but had nothing usable.
#[async_trait]
pub trait TagSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, prompt: &str) -> Result<Option<Extraction>, ProviderError>;
}

/// Ordered list of tag sources with a static terminal fallback.
pub struct TagChain {
    sources: Vec<Box<dyn TagSource>>,
}

impl TagChain {
    pub fn new(sources: Vec<Box<dyn TagSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub async fn extract(&self, prompt: &str) -> Extraction {
        for source in &self.sources {
            match source.extract(prompt).await {
                Ok(Some(mut extraction)) => {
                    extraction.tags = normalize_tags(extraction.tags);
                    if !extraction.tags.is_empty() {
                        tracing::debug!(source = source.name(), tags = ?extraction.tags, "tags extracted");
                        return extraction;
                    }
                    tracing::warn!(source = source.name(), "tag source returned no usable tags");
                }
                Ok(None) => {
                    tracing::warn!(source = source.name(), "tag source returned nothing");
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "tag source failed");
                }
            }
        }
        tracing::warn!("all tag sources exhausted, using defaults");
        Extraction::fallback()
    }
}

/// Trims, lowercases, drops empties and duplicates, caps at [`MAX_TAGS`].
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in raw {
        let tag = tag
            .as_ref()
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .trim()
            .to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

/// Splits a comma-separated model answer into tags.
pub fn parse_tag_list(text: &str) -> Vec<String> {
    // Models often continue past the list on a new line.
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    normalize_tags(first_line.split(','))
}
