//! In-memory fakes shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::discovery::{Discovered, TrackCandidate, TrackDiscovery};
use crate::error::ProviderError;
use crate::platform::{PlacedItem, PlaylistPlatform, PlaylistRef, TokenSet, UserProfile};
use crate::tags::{Extraction, TagSource};

/// Tag source that always errors.
pub struct FailingTags;

#[async_trait]
impl TagSource for FailingTags {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extract(&self, _prompt: &str) -> Result<Option<Extraction>, ProviderError> {
        Err(ProviderError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "model loading".into(),
        })
    }
}

/// Discovery returning `track 0..n` and recording the tags it was asked for.
pub struct FakeDiscovery {
    count: usize,
    fail: bool,
    pub seen_tags: Arc<Mutex<Vec<String>>>,
}

impl FakeDiscovery {
    pub fn tracks(count: usize) -> Self {
        Self {
            count,
            fail: false,
            seen_tags: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::tracks(0)
        }
    }
}

#[async_trait]
impl TrackDiscovery for FakeDiscovery {
    async fn discover(
        &self,
        extraction: &Extraction,
        _access_token: &str,
    ) -> Result<Discovered, ProviderError> {
        self.seen_tags
            .lock()
            .unwrap()
            .extend(extraction.tags.iter().cloned());
        if self.fail {
            return Err(ProviderError::Missing("tracks"));
        }
        Ok(Discovered {
            tracks: (0..self.count)
                .map(|i| TrackCandidate {
                    name: format!("track {i}"),
                    artist: "artist".into(),
                    url: None,
                    uri: None,
                })
                .collect(),
            genres: None,
            energy: None,
        })
    }
}

/// Platform fake. Tokens listed in `expired` are rejected; refreshing yields `"fresh"`.
#[derive(Default)]
pub struct FakePlatform {
    pub expired: Vec<String>,
    pub refresh_fails: bool,
    pub exchange_fails: bool,
    /// Candidate names the search cannot find.
    pub unresolvable: Vec<String>,
    /// Item ids the append call rejects.
    pub append_fails: Vec<String>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<String>>,
    pub appended: Mutex<Vec<(String, String)>>,
}

impl FakePlatform {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == "refresh")
            .count()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    /// `(token, item id)` per successful append.
    pub fn appended(&self) -> Vec<(String, String)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaylistPlatform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://platform.test/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        self.record("exchange_code");
        if self.exchange_fails {
            return Err(ProviderError::Status {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: "invalid_grant".into(),
            });
        }
        Ok(TokenSet {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh & more".into()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.record("refresh");
        if self.refresh_fails {
            return Err(ProviderError::Status {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: "invalid_grant".into(),
            });
        }
        Ok(TokenSet {
            access_token: "fresh".into(),
            refresh_token: None,
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, ProviderError> {
        self.record("current_user");
        if self.expired.iter().any(|t| t == access_token) {
            return Err(ProviderError::Unauthorized);
        }
        Ok(UserProfile { id: "user-1".into() })
    }

    async fn create_playlist(
        &self,
        _access_token: &str,
        _user: &UserProfile,
        name: &str,
    ) -> Result<PlaylistRef, ProviderError> {
        self.record("create_playlist");
        self.created.lock().unwrap().push(name.to_string());
        Ok(PlaylistRef {
            id: "pl-1".into(),
            url: "https://platform.test/playlist/pl-1".into(),
        })
    }

    async fn resolve(
        &self,
        _access_token: &str,
        candidate: &TrackCandidate,
    ) -> Result<PlacedItem, ProviderError> {
        self.record("resolve");
        if self.unresolvable.contains(&candidate.name) {
            return Err(ProviderError::Missing("search result"));
        }
        Ok(PlacedItem {
            id: candidate.name.clone(),
            url: Some(format!("https://platform.test/item/{}", candidate.name)),
        })
    }

    async fn append(
        &self,
        access_token: &str,
        _playlist: &PlaylistRef,
        item: &PlacedItem,
    ) -> Result<(), ProviderError> {
        self.record("append");
        if self.append_fails.contains(&item.id) {
            return Err(ProviderError::Status {
                status: reqwest::StatusCode::FORBIDDEN,
                body: "quota".into(),
            });
        }
        self.appended
            .lock()
            .unwrap()
            .push((access_token.to_string(), item.id.clone()));
        Ok(())
    }
}
