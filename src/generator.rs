//! Prompt → playlist pipeline.

use std::sync::Arc;

use serde::Serialize;

use crate::batch::collect_tolerant;
use crate::discovery::{TrackCandidate, TrackDiscovery};
use crate::error::{AppError, ProviderError};
use crate::platform::{PlacedItem, PlaylistPlatform, PlaylistRef, UserProfile};
use crate::tags::{Extraction, TagChain};

/// Track as reported back to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTrack {
    pub name: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of a successful generation.
#[derive(Debug)]
pub struct Generated {
    pub playlist: PlaylistRef,
    pub tracks: Vec<ResolvedTrack>,
    pub extraction: Extraction,
    pub genres: Option<Vec<String>>,
    pub energy: Option<f32>,
    /// Set when the access token had to be refreshed during the request.
    pub refreshed_token: Option<String>,
}

/// Authenticated user plus the token that worked.
struct Session {
    user: UserProfile,
    access_token: String,
    refreshed: bool,
}

pub struct PlaylistGenerator {
    tags: TagChain,
    discovery: Arc<dyn TrackDiscovery>,
    platform: Arc<dyn PlaylistPlatform>,
}

impl PlaylistGenerator {
    pub fn new(
        tags: TagChain,
        discovery: Arc<dyn TrackDiscovery>,
        platform: Arc<dyn PlaylistPlatform>,
    ) -> Self {
        Self {
            tags,
            discovery,
            platform,
        }
    }

    /// Probes the platform with `access_token`, refreshing once on a 401.
    async fn open_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Session, AppError> {
        match self.platform.current_user(access_token).await {
            Ok(user) => Ok(Session {
                user,
                access_token: access_token.to_string(),
                refreshed: false,
            }),
            Err(ProviderError::Unauthorized) => {
                let Some(refresh_token) = refresh_token else {
                    return Err(AppError::Unauthorized(
                        "access token expired and no refresh token was sent".into(),
                    ));
                };
                tracing::info!(
                    platform = self.platform.name(),
                    "access token rejected, refreshing"
                );
                let tokens = self
                    .platform
                    .refresh(refresh_token)
                    .await
                    .map_err(|e| AppError::Upstream(format!("token refresh failed: {}", e)))?;
                let user = self.platform.current_user(&tokens.access_token).await?;
                Ok(Session {
                    user,
                    access_token: tokens.access_token,
                    refreshed: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        playlist_name: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Generated, AppError> {
        let session = self.open_session(access_token, refresh_token).await?;
        let token = session.access_token.as_str();

        let extraction = self.tags.extract(prompt).await;
        tracing::info!(tags = ?extraction.tags, mood = ?extraction.mood, "prompt analysed");

        let discovered = self.discovery.discover(&extraction, token).await?;
        if discovered.tracks.is_empty() {
            return Err(AppError::BadRequest("no tracks found for this prompt".into()));
        }

        let platform = &self.platform;
        let placed = collect_tolerant(
            "track lookup",
            &discovered.tracks,
            move |candidate| async move {
                platform
                    .resolve(token, candidate)
                    .await
                    .map(|item| (candidate, item))
            },
        )
        .await;
        if placed.is_empty() {
            return Err(AppError::BadRequest(
                "none of the found tracks are available on the platform".into(),
            ));
        }

        let playlist = self
            .platform
            .create_playlist(token, &session.user, playlist_name)
            .await?;
        tracing::info!(playlist = %playlist.id, candidates = placed.ok.len(), "playlist created");

        let target = &playlist;
        let labelled: Vec<Labelled> = placed
            .ok
            .iter()
            .map(|(candidate, item)| Labelled(candidate, item))
            .collect();
        let added = collect_tolerant(
            "playlist append",
            labelled,
            move |Labelled(candidate, item)| async move {
                platform
                    .append(token, target, item)
                    .await
                    .map(|()| resolved(candidate, item))
            },
        )
        .await;
        if added.is_empty() {
            return Err(AppError::Upstream(format!(
                "no track could be added to playlist {}",
                playlist.id
            )));
        }
        tracing::info!(
            added = added.ok.len(),
            skipped = placed.failed + added.failed,
            "playlist populated"
        );

        Ok(Generated {
            playlist,
            tracks: added.ok,
            extraction,
            genres: discovered.genres,
            energy: discovered.energy,
            refreshed_token: session.refreshed.then_some(session.access_token),
        })
    }
}

/// Candidate paired with its platform item, labelled by the candidate for logging.
struct Labelled<'a>(&'a TrackCandidate, &'a PlacedItem);

impl std::fmt::Display for Labelled<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.0, f)
    }
}

fn resolved(candidate: &TrackCandidate, item: &PlacedItem) -> ResolvedTrack {
    ResolvedTrack {
        name: candidate.name.clone(),
        artist: candidate.artist.clone(),
        url: item.url.clone().or_else(|| candidate.url.clone()),
    }
}
