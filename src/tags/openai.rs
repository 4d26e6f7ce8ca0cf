//! Chat-completions tag source (OpenAI-compatible API).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::config::OpenAiConfig;
use crate::error::{ensure_success, ProviderError};

use super::{Extraction, TagSource};

const SYSTEM_PROMPT: &str = "Extract the listening mood from the user's text. \
Respond ONLY with valid JSON in this exact format: \
{\"mood\": string, \"energy\": number between 0 and 1, \"tags\": [up to 3 lowercase music genres or moods]}";

pub struct OpenAiTagSource {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiTagSource {
    pub fn new(client: Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TagSource for OpenAiTagSource {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn extract(&self, prompt: &str) -> Result<Option<Extraction>, ProviderError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.3,
        });

        let res = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let completion: ChatCompletion = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ProviderError::Missing("choices[0].message.content"))?;

        parse_completion(&content).map(Some)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

/// Shape the model is asked for; `genres` is tolerated in place of `tags`.
#[derive(Deserialize)]
struct MoodPayload {
    #[serde(default, alias = "genres")]
    tags: Vec<String>,
    mood: Option<String>,
    #[serde(default, deserialize_with = "lenient_energy")]
    energy: Option<f32>,
}

/// Accepts `0.3` or `"0.3"`; anything else counts as absent.
fn lenient_energy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().map(|e| e as f32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parses the model's JSON answer, ignoring markdown code fences around it.
pub(crate) fn parse_completion(content: &str) -> Result<Extraction, ProviderError> {
    let clean = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let payload: MoodPayload = serde_json::from_str(clean).map_err(ProviderError::parse)?;
    Ok(Extraction {
        tags: super::normalize_tags(payload.tags),
        mood: payload.mood.filter(|m| !m.trim().is_empty()),
        energy: payload.energy,
    })
}
