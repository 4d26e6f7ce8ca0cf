//! Candidate track discovery.
//!
//! Two flows: a single seeded recommendation request (genre + energy) and a per-tag
//! top-tracks aggregation where a failing tag is skipped.

mod lastfm;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::batch::collect_tolerant;
use crate::error::ProviderError;
use crate::tags::Extraction;

pub use lastfm::LastFmClient;

/// Cap for the recommendation flow.
pub const RECOMMENDATION_LIMIT: usize = 20;
/// Cap for the tag aggregation flow.
pub const AGGREGATION_LIMIT: usize = 15;

/// Genres accepted as recommendation seeds.
pub const VALID_GENRES: [&str; 14] = [
    "pop", "rock", "hip-hop", "dance", "country", "jazz", "classical", "blues", "metal",
    "reggae", "soul", "punk", "funk", "electronic",
];
const DEFAULT_GENRE: &str = "pop";
const DEFAULT_ENERGY: f32 = 0.5;
const MAX_SEEDS: usize = 3;

/// A track found by discovery, not yet placed on the target platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackCandidate {
    pub name: String,
    pub artist: String,
    pub url: Option<String>,
    /// Platform-native id when discovery already knows it (Spotify URI).
    pub uri: Option<String>,
}

impl std::fmt::Display for TrackCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)
    }
}

/// Tracks and the seeds actually used to find them.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub tracks: Vec<TrackCandidate>,
    /// Validated genre seeds, only set by the recommendation flow.
    pub genres: Option<Vec<String>>,
    pub energy: Option<f32>,
}

#[async_trait]
pub trait TrackDiscovery: Send + Sync {
    /// `access_token` is the caller's platform credential; sources that don't need it ignore it.
    async fn discover(
        &self,
        extraction: &Extraction,
        access_token: &str,
    ) -> Result<Discovered, ProviderError>;
}

/// Keeps allow-listed genres (case-insensitive), at most three, defaulting to `pop`.
pub fn filter_genres<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if VALID_GENRES.contains(&tag.as_str()) && !genres.contains(&tag) {
            genres.push(tag);
        }
        if genres.len() == MAX_SEEDS {
            break;
        }
    }
    if genres.is_empty() {
        genres.push(DEFAULT_GENRE.to_string());
    }
    genres
}

/// Clamps to [0, 1]; missing or NaN becomes 0.5.
pub fn clamp_energy(energy: Option<f32>) -> f32 {
    match energy {
        Some(e) if !e.is_nan() => e.clamp(0.0, 1.0),
        _ => DEFAULT_ENERGY,
    }
}

/// Catalog that can seed recommendations from genres and a target energy.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn recommend(
        &self,
        access_token: &str,
        genres: &[String],
        energy: f32,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError>;
}

/// Recommendation flow: one seeded request with validated genres and clamped energy.
pub struct Recommendations {
    source: Arc<dyn RecommendationSource>,
}

impl Recommendations {
    pub fn new(source: Arc<dyn RecommendationSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl TrackDiscovery for Recommendations {
    async fn discover(
        &self,
        extraction: &Extraction,
        access_token: &str,
    ) -> Result<Discovered, ProviderError> {
        let genres = filter_genres(&extraction.tags);
        let energy = clamp_energy(extraction.energy);

        let mut tracks = self
            .source
            .recommend(access_token, &genres, energy, RECOMMENDATION_LIMIT as u32)
            .await?;
        tracks.truncate(RECOMMENDATION_LIMIT);

        Ok(Discovered {
            tracks,
            genres: Some(genres),
            energy: Some(energy),
        })
    }
}

/// Catalog that can list popular tracks for a tag.
#[async_trait]
pub trait TagCatalog: Send + Sync {
    async fn top_tracks(
        &self,
        tag: &str,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError>;
}

/// Splits the aggregation cap evenly across tags, rounding up.
fn per_tag_limit(tag_count: usize) -> u32 {
    AGGREGATION_LIMIT.div_ceil(tag_count.max(1)) as u32
}

/// Aggregation flow: top tracks for each tag, concatenated and capped.
pub struct TagAggregation<C> {
    catalog: C,
}

impl<C: TagCatalog> TagAggregation<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl<C: TagCatalog> TrackDiscovery for TagAggregation<C> {
    async fn discover(
        &self,
        extraction: &Extraction,
        _access_token: &str,
    ) -> Result<Discovered, ProviderError> {
        let catalog = &self.catalog;
        let limit = per_tag_limit(extraction.tags.len());
        let per_tag = collect_tolerant("tag lookup", &extraction.tags, move |tag| async move {
            catalog.top_tracks(tag, limit).await
        })
        .await;

        let tracks: Vec<TrackCandidate> = per_tag
            .ok
            .into_iter()
            .flatten()
            .take(AGGREGATION_LIMIT)
            .collect();

        Ok(Discovered {
            tracks,
            genres: None,
            energy: extraction.energy.map(|e| clamp_energy(Some(e))),
        })
    }
}
