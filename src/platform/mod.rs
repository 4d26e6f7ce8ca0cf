//! Streaming platforms a playlist can be written to.
//!
//! Each platform owns its OAuth authorization-code flow and the handful of REST calls
//! needed to create a private playlist and append items to it. Credentials are always
//! passed in per call; nothing is stored server-side.

pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;

use crate::discovery::TrackCandidate;
use crate::error::ProviderError;

pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

/// Tokens returned by a code exchange or refresh.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Refresh responses may omit it; the caller keeps the one it already has.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRef {
    pub id: String,
    pub url: String,
}

/// A candidate resolved to a platform-native item.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedItem {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PlaylistPlatform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Consent screen URL carrying `state`.
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError>;

    /// Profile probe; a rejected token comes back as [`ProviderError::Unauthorized`].
    async fn current_user(&self, access_token: &str) -> Result<UserProfile, ProviderError>;

    /// Creates a private playlist owned by `user`.
    async fn create_playlist(
        &self,
        access_token: &str,
        user: &UserProfile,
        name: &str,
    ) -> Result<PlaylistRef, ProviderError>;

    /// Finds the platform item for a candidate. No match is [`ProviderError::Missing`].
    async fn resolve(
        &self,
        access_token: &str,
        candidate: &TrackCandidate,
    ) -> Result<PlacedItem, ProviderError>;

    async fn append(
        &self,
        access_token: &str,
        playlist: &PlaylistRef,
        item: &PlacedItem,
    ) -> Result<(), ProviderError>;
}

/// Random value for the OAuth `state` parameter.
pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

/// `base?k=v&...` with URL-encoded values.
pub(crate) fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", base, query)
}
