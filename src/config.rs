use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, bail};

/// Streaming platform the playlist is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Spotify,
    YouTube,
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spotify" => Ok(Platform::Spotify),
            "youtube" | "yt" => Ok(Platform::YouTube),
            _ => Err(anyhow!("unknown PLAYLIST_PLATFORM: {}", s)),
        }
    }
}

/// Where candidate tracks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    /// Seeded Spotify recommendations (genre + energy).
    Recommendations,
    /// Last.fm top tracks per tag.
    LastFm,
}

impl FromStr for TrackSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recommendations" | "spotify" => Ok(TrackSource::Recommendations),
            "lastfm" | "last.fm" => Ok(TrackSource::LastFm),
            _ => Err(anyhow!("unknown TRACK_SOURCE: {}", s)),
        }
    }
}

/// OAuth client registration for the playlist platform.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub model: String,
}

/// Application configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub frontend_url: String,
    pub platform: Platform,
    pub track_source: TrackSource,
    pub oauth: OAuthClient,
    pub openai: Option<OpenAiConfig>,
    pub huggingface: Option<HuggingFaceConfig>,
    pub lastfm_api_key: Option<String>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        // Blank values count as unset.
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| anyhow!("{} is required", key));

        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let frontend_url = var("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3001".into())
            .trim_end_matches('/')
            .to_string();

        let platform = match var("PLAYLIST_PLATFORM") {
            Some(p) => p.parse()?,
            None => Platform::Spotify,
        };

        let track_source = match var("TRACK_SOURCE") {
            Some(s) => s.parse()?,
            None => match platform {
                Platform::Spotify => TrackSource::Recommendations,
                Platform::YouTube => TrackSource::LastFm,
            },
        };

        if platform == Platform::YouTube && track_source == TrackSource::Recommendations {
            bail!("TRACK_SOURCE=recommendations needs PLAYLIST_PLATFORM=spotify");
        }

        let oauth = match platform {
            Platform::Spotify => OAuthClient {
                client_id: required("SPOTIFY_CLIENT_ID")?,
                client_secret: required("SPOTIFY_CLIENT_SECRET")?,
                redirect_uri: required("SPOTIFY_REDIRECT_URI")?,
            },
            Platform::YouTube => OAuthClient {
                client_id: required("GOOGLE_CLIENT_ID")?,
                client_secret: required("GOOGLE_CLIENT_SECRET")?,
                redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            },
        };

        let openai = var("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into())
                .trim_end_matches('/')
                .to_string(),
            model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
        });

        let huggingface = var("HF_API_KEY").map(|api_key| HuggingFaceConfig {
            api_key,
            model: var("HF_MODEL")
                .unwrap_or_else(|| "mistralai/Mistral-7B-Instruct-v0.2".into()),
        });

        let lastfm_api_key = var("LASTFM_API_KEY");
        if track_source == TrackSource::LastFm && lastfm_api_key.is_none() {
            bail!("LASTFM_API_KEY is required when TRACK_SOURCE=lastfm");
        }

        let http_timeout = Duration::from_secs(
            var("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        );

        Ok(Self {
            port,
            frontend_url,
            platform,
            track_source,
            oauth,
            openai,
            huggingface,
            lastfm_api_key,
            http_timeout,
        })
    }
}
