//! Last.fm client for `tag.gettoptracks`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ensure_success, ProviderError};

use super::{TagCatalog, TrackCandidate};

const API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

pub struct LastFmClient {
    client: Client,
    api_key: String,
}

impl LastFmClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl TagCatalog for LastFmClient {
    async fn top_tracks(
        &self,
        tag: &str,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError> {
        let limit = limit.to_string();
        let params = [
            ("method", "tag.gettoptracks"),
            ("tag", tag),
            ("limit", limit.as_str()),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
        ];

        tracing::debug!(tag, "fetching Last.fm top tracks");
        let res = self.client.get(API_BASE).query(&params).send().await?;
        let body = ensure_success(res).await?.text().await?;
        parse_top_tracks(&body)
    }
}

#[derive(Deserialize)]
struct TopTracksResponse {
    tracks: TopTracks,
}

#[derive(Deserialize)]
struct TopTracks {
    #[serde(default)]
    track: OneOrMany<LastFmTrack>,
}

/// Last.fm collapses a single-element list into a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct LastFmTrack {
    name: String,
    #[serde(default)]
    url: Option<String>,
    artist: LastFmArtist,
}

#[derive(Deserialize)]
struct LastFmArtist {
    name: String,
}

/// Last.fm reports API errors as `{"error": code, "message": ...}` with a 200 status.
fn parse_top_tracks(body: &str) -> Result<Vec<TrackCandidate>, ProviderError> {
    let value: Value = serde_json::from_str(body).map_err(ProviderError::parse)?;
    if let Some(code) = value.get("error").and_then(Value::as_i64) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ProviderError::Parse(format!(
            "Last.fm error {}: {}",
            code, message
        )));
    }

    let parsed: TopTracksResponse = serde_json::from_value(value).map_err(ProviderError::parse)?;
    Ok(parsed
        .tracks
        .track
        .into_vec()
        .into_iter()
        .map(|t| TrackCandidate {
            name: t.name,
            artist: t.artist.name,
            url: t.url.filter(|u| !u.is_empty()),
            uri: None,
        })
        .collect())
}
