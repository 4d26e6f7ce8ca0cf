//! YouTube Data API v3 client with Google OAuth.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::OAuthClient;
use crate::discovery::TrackCandidate;
use crate::error::{ensure_success, ProviderError};

use super::{with_query, PlacedItem, PlaylistPlatform, PlaylistRef, TokenSet, UserProfile};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const SCOPE: &str = "https://www.googleapis.com/auth/youtube";

#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    oauth: OAuthClient,
}

impl YouTubeClient {
    pub fn new(client: Client, oauth: OAuthClient) -> Self {
        Self { client, oauth }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let mut form = vec![
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let res = self.client.post(TOKEN_URL).form(&form).send().await?;
        ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)
    }
}

pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", playlist_id)
}

#[async_trait]
impl PlaylistPlatform for YouTubeClient {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn authorize_url(&self, state: &str) -> String {
        with_query(
            AUTHORIZE_URL,
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                // Google only issues a refresh token for offline access with forced consent.
                ("access_type", "offline"),
                ("prompt", "consent"),
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
            .get(format!("{}/channels", API_BASE))
            .query(&[("part", "id"), ("mine", "true")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let channels: ItemList<Channel> = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        channels
            .items
            .into_iter()
            .next()
            .map(|c| UserProfile { id: c.id })
            .ok_or(ProviderError::Missing("channel"))
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        _user: &UserProfile,
        name: &str,
    ) -> Result<PlaylistRef, ProviderError> {
        let body = json!({
            "snippet": { "title": name },
            "status": { "privacyStatus": "private" },
        });
        let res = self
            .client
            .post(format!("{}/playlists", API_BASE))
            .query(&[("part", "snippet,status")])
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let created: Created = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        Ok(PlaylistRef {
            url: playlist_url(&created.id),
            id: created.id,
        })
    }

    async fn resolve(
        &self,
        access_token: &str,
        candidate: &TrackCandidate,
    ) -> Result<PlacedItem, ProviderError> {
        let q = format!("{} {}", candidate.name, candidate.artist);
        let res = self
            .client
            .get(format!("{}/search", API_BASE))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "1"),
                ("q", q.as_str()),
            ])
            .bearer_auth(access_token)
            .send()
            .await?;
        let results: ItemList<SearchItem> = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(ProviderError::parse)?;
        first_video_id(results)
            .map(|id| PlacedItem {
                url: Some(video_url(&id)),
                id,
            })
            .ok_or(ProviderError::Missing("video search result"))
    }

    async fn append(
        &self,
        access_token: &str,
        playlist: &PlaylistRef,
        item: &PlacedItem,
    ) -> Result<(), ProviderError> {
        let body = json!({
            "snippet": {
                "playlistId": playlist.id,
                "resourceId": { "kind": "youtube#video", "videoId": item.id },
            },
        });
        let res = self
            .client
            .post(format!("{}/playlistItems", API_BASE))
            .query(&[("part", "snippet")])
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        ensure_success(res).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct Channel {
    id: String,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

fn first_video_id(results: ItemList<SearchItem>) -> Option<String> {
    results.items.into_iter().find_map(|item| item.id.video_id)
}
