//! Hugging Face Inference API tag source.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::HuggingFaceConfig;
use crate::error::{ensure_success, ProviderError};

use super::{parse_tag_list, Extraction, TagSource};

const API_BASE: &str = "https://api-inference.huggingface.co/models";

pub struct HuggingFaceTagSource {
    client: Client,
    config: HuggingFaceConfig,
}

impl HuggingFaceTagSource {
    pub fn new(client: Client, config: HuggingFaceConfig) -> Self {
        Self { client, config }
    }
}

fn instruction(prompt: &str) -> String {
    format!(
        "Give exactly 3 music genres or moods that fit this description, \
         as a comma-separated list with no other text.\nDescription: {}\nTags:",
        prompt
    )
}

#[async_trait]
impl TagSource for HuggingFaceTagSource {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn extract(&self, prompt: &str) -> Result<Option<Extraction>, ProviderError> {
        let body = json!({
            "inputs": instruction(prompt),
            "parameters": {
                "max_new_tokens": 24,
                "return_full_text": false,
            },
        });

        let res = self
            .client
            .post(format!("{}/{}", API_BASE, self.config.model))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let generations: Vec<Generation> = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;

        let text = generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or(ProviderError::Missing("generated_text"))?;

        let tags = parse_tag_list(&text);
        if tags.is_empty() {
            return Ok(None);
        }
        Ok(Some(Extraction::from_tags(tags)))
    }
}

#[derive(Deserialize)]
struct Generation {
    generated_text: String,
}
