//! Spotify Web API client.
//!
//! Uses the Authorization Code flow: the app credentials sign the token requests,
//! every catalog and playlist call runs on the user's own access token.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::OAuthClient;
use crate::discovery::{RecommendationSource, TrackCandidate};
use crate::error::{ensure_success, ProviderError};

use super::{with_query, PlacedItem, PlaylistPlatform, PlaylistRef, TokenSet, UserProfile};

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

pub const SCOPES: [&str; 3] = [
    "playlist-modify-public",
    "playlist-modify-private",
    "user-read-private",
];

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    oauth: OAuthClient,
}

impl SpotifyClient {
    pub fn new(client: Client, oauth: OAuthClient) -> Self {
        Self { client, oauth }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let auth = base64::engine::general_purpose::STANDARD.encode(
            format!("{}:{}", self.oauth.client_id, self.oauth.client_secret).as_bytes(),
        );

        let res = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", auth))
            .form(params)
            .send()
            .await?;

        // A bad code or revoked refresh token is a 400 here, not a 401.
        ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)
    }

    /// Search for tracks in the Spotify catalog.
    pub async fn search_tracks(
        &self,
        access_token: &str,
        q: &str,
        limit: u32,
    ) -> Result<Vec<Track>, ProviderError> {
        let limit = limit.clamp(1, 50);
        let url = format!(
            "{}/search?q={}&type=track&limit={}",
            API_BASE,
            urlencoding::encode(q),
            limit,
        );

        let res = self.client.get(&url).bearer_auth(access_token).send().await?;
        let body: SearchResponse = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        Ok(body.tracks.items)
    }

    /// Seeded recommendations. `genres` must already be validated seeds.
    pub async fn recommendations(
        &self,
        access_token: &str,
        genres: &[String],
        target_energy: f32,
        limit: u32,
    ) -> Result<Vec<Track>, ProviderError> {
        let url = format!(
            "{}/recommendations?seed_genres={}&target_energy={}&limit={}",
            API_BASE,
            urlencoding::encode(&genres.join(",")),
            target_energy,
            limit.clamp(1, 100),
        );

        let res = self.client.get(&url).bearer_auth(access_token).send().await?;
        let body: RecommendationsResponse = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        Ok(body.tracks)
    }
}

#[async_trait]
impl RecommendationSource for SpotifyClient {
    async fn recommend(
        &self,
        access_token: &str,
        genres: &[String],
        energy: f32,
        limit: u32,
    ) -> Result<Vec<TrackCandidate>, ProviderError> {
        let tracks = self.recommendations(access_token, genres, energy, limit).await?;
        Ok(tracks.iter().map(Track::to_candidate).collect())
    }
}

#[async_trait]
impl PlaylistPlatform for SpotifyClient {
    fn name(&self) -> &'static str {
        "spotify"
    }

    fn authorize_url(&self, state: &str) -> String {
        let scope = SCOPES.join(" ");
        with_query(
            AUTHORIZE_URL,
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        let res = self
            .client
            .get(format!("{}/me", API_BASE))
            .bearer_auth(access_token)
            .send()
            .await?;
        let me: Me = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        Ok(UserProfile { id: me.id })
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        user: &UserProfile,
        name: &str,
    ) -> Result<PlaylistRef, ProviderError> {
        let url = format!(
            "{}/users/{}/playlists",
            API_BASE,
            urlencoding::encode(&user.id)
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "name": name, "public": false }))
            .send()
            .await?;
        let playlist: CreatedPlaylist = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;

        let url = playlist
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", playlist.id));
        Ok(PlaylistRef {
            id: playlist.id,
            url,
        })
    }

    async fn resolve(
        &self,
        access_token: &str,
        candidate: &TrackCandidate,
    ) -> Result<PlacedItem, ProviderError> {
        if let Some(uri) = &candidate.uri {
            return Ok(PlacedItem {
                id: uri.clone(),
                url: candidate.url.clone(),
            });
        }

        let q = format!("track:{} artist:{}", candidate.name, candidate.artist);
        let track = self
            .search_tracks(access_token, &q, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(ProviderError::Missing("search result"))?;
        Ok(PlacedItem {
            id: track.uri,
            url: track.external_urls.spotify,
        })
    }

    async fn append(
        &self,
        access_token: &str,
        playlist: &PlaylistRef,
        item: &PlacedItem,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{}/playlists/{}/tracks",
            API_BASE,
            urlencoding::encode(&playlist.id)
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "uris": [item.id] }))
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TracksPage,
}

#[derive(Deserialize)]
struct TracksPage {
    #[serde(default)]
    items: Vec<Track>,
}

#[derive(Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Deserialize)]
struct Me {
    id: String,
}

#[derive(Deserialize)]
struct CreatedPlaylist {
    id: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

/// A Spotify track (simplified).
#[derive(Clone, Debug, Deserialize)]
pub struct Track {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    pub fn to_candidate(&self) -> TrackCandidate {
        TrackCandidate {
            name: self.name.clone(),
            artist: self
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            url: self.external_urls.spotify.clone(),
            uri: Some(self.uri.clone()),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Artist {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}
