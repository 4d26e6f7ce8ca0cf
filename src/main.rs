mod batch;
mod config;
mod discovery;
mod error;
mod generator;
mod handlers;
mod platform;
mod tags;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Platform, TrackSource};
use crate::discovery::{LastFmClient, Recommendations, TagAggregation, TrackDiscovery};
use crate::generator::PlaylistGenerator;
use crate::handlers::{router, AppState};
use crate::platform::{PlaylistPlatform, SpotifyClient, YouTubeClient};
use crate::tags::{HuggingFaceTagSource, OpenAiTagSource, TagChain, TagSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let state = build_state(&config)?;

    let app = router()
        .layer(cors(&config.frontend_url)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        platform = ?config.platform,
        track_source = ?config.track_source,
        "listening on {}",
        addr
    );

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}

/// Wires the platform, track source and tag chain selected by `config`.
fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let mut sources: Vec<Box<dyn TagSource>> = Vec::new();
    if let Some(openai) = &config.openai {
        sources.push(Box::new(OpenAiTagSource::new(http.clone(), openai.clone())));
    }
    if let Some(hf) = &config.huggingface {
        sources.push(Box::new(HuggingFaceTagSource::new(http.clone(), hf.clone())));
    }
    let tags = TagChain::new(sources);
    if tags.is_empty() {
        tracing::warn!("no tag source configured, every prompt maps to the default tags");
    }

    let spotify = match config.platform {
        Platform::Spotify => Some(Arc::new(SpotifyClient::new(http.clone(), config.oauth.clone()))),
        Platform::YouTube => None,
    };

    let platform: Arc<dyn PlaylistPlatform> = match &spotify {
        Some(spotify) => spotify.clone(),
        None => Arc::new(YouTubeClient::new(http.clone(), config.oauth.clone())),
    };

    let discovery: Arc<dyn TrackDiscovery> = match (config.track_source, spotify) {
        (TrackSource::Recommendations, Some(spotify)) => Arc::new(Recommendations::new(spotify)),
        (TrackSource::Recommendations, None) => {
            anyhow::bail!("recommendations require the Spotify platform")
        }
        (TrackSource::LastFm, _) => {
            let api_key = config
                .lastfm_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("LASTFM_API_KEY is required"))?;
            Arc::new(TagAggregation::new(LastFmClient::new(http.clone(), api_key)))
        }
    };

    Ok(AppState {
        generator: Arc::new(PlaylistGenerator::new(tags, discovery, platform.clone())),
        platform,
        frontend_url: Arc::from(config.frontend_url.as_str()),
    })
}

/// Only the configured frontend may call us, with credentials.
fn cors(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = frontend_url.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}
