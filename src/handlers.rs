//! HTTP handlers for the playlist API.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::generator::{Generated, PlaylistGenerator, ResolvedTrack};
use crate::platform::{new_state, with_query, PlaylistPlatform};

const STATE_COOKIE: &str = "oauth_state";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<PlaylistGenerator>,
    pub platform: Arc<dyn PlaylistPlatform>,
    pub frontend_url: Arc<str>,
}

/// Query parameters of the OAuth redirect back to us.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
}

/// Body of `POST /generate-playlist`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, rename = "playlistName")]
    pub playlist_name: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub message: String,
    pub playlist_url: String,
    pub tracks: Vec<ResolvedTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f32>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
}

impl From<Generated> for GenerateResponse {
    fn from(g: Generated) -> Self {
        GenerateResponse {
            message: format!("Playlist created with {} tracks", g.tracks.len()),
            playlist_url: g.playlist.url,
            tracks: g.tracks,
            mood: g.extraction.mood,
            energy: g.energy.or(g.extraction.energy),
            tags: g.extraction.tags,
            genres: g.genres,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Value of cookie `name` across all `Cookie` headers.
fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn found(location: &str, set_cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, location.to_string()), (SET_COOKIE, set_cookie)],
    )
        .into_response()
}

/// GET /health - Health check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /login - Redirect to the platform's consent screen.
pub async fn login(State(state): State<AppState>) -> Response {
    let oauth_state = new_state();
    let url = state.platform.authorize_url(&oauth_state);
    tracing::debug!(platform = state.platform.name(), "redirecting to consent screen");
    found(
        &url,
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=600",
            STATE_COOKIE, oauth_state
        ),
    )
}

/// GET /callback - Exchange the authorization code and hand the tokens to the frontend.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    if let Some(error) = params.error {
        tracing::warn!(%error, "authorization denied");
        return (StatusCode::BAD_REQUEST, format!("Login failed: {}", error)).into_response();
    }
    let Some(code) = non_blank(&params.code) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code").into_response();
    };

    let expected = cookie(&headers, STATE_COOKIE);
    if expected.is_none() || expected != params.state.as_deref() {
        tracing::warn!("OAuth state mismatch");
        return (StatusCode::BAD_REQUEST, "Invalid OAuth state").into_response();
    }

    let tokens = match state.platform.exchange_code(code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, platform = state.platform.name(), "code exchange failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response();
        }
    };

    let mut params = vec![("access_token", tokens.access_token.as_str())];
    if let Some(refresh) = tokens.refresh_token.as_deref() {
        params.push(("refresh_token", refresh));
    }
    let location = with_query(&format!("{}/", state.frontend_url), &params);
    found(
        &location,
        format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", STATE_COOKIE),
    )
}

/// POST /generate-playlist - Turn a prompt into a playlist on the user's account.
pub async fn generate_playlist(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let (Some(prompt), Some(playlist_name)) =
        (non_blank(&req.prompt), non_blank(&req.playlist_name))
    else {
        return Err(AppError::BadRequest("prompt and playlistName are required".into()));
    };
    let Some(access_token) = non_blank(&req.access_token) else {
        return Err(AppError::Unauthorized("log in first (/login)".into()));
    };

    let generated = state
        .generator
        .generate(
            prompt,
            playlist_name,
            access_token,
            non_blank(&req.refresh_token),
        )
        .await?;

    let refreshed = generated.refreshed_token.clone();
    let body = Json(GenerateResponse::from(generated));
    Ok(match refreshed {
        Some(token) => (
            [(
                SET_COOKIE,
                format!("access_token={}; HttpOnly; SameSite=Lax; Path=/", token),
            )],
            body,
        )
            .into_response(),
        None => body.into_response(),
    })
}

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/generate-playlist", post(generate_playlist))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::Value;

    use super::*;
    use crate::tags::TagChain;
    use crate::testing::{FailingTags, FakeDiscovery, FakePlatform};

    fn app_state(platform: Arc<FakePlatform>, discovery: FakeDiscovery) -> AppState {
        let generator = PlaylistGenerator::new(
            TagChain::new(vec![Box::new(FailingTags)]),
            Arc::new(discovery),
            platform.clone(),
        );
        AppState {
            generator: Arc::new(generator),
            platform,
            frontend_url: Arc::from("http://localhost:3001"),
        }
    }

    fn request(prompt: &str, name: &str, access: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            prompt: Some(prompt.into()),
            playlist_name: Some(name.into()),
            access_token: access.map(String::from),
            refresh_token: Some("refresh".into()),
        }
    }

    fn rejected(result: Result<Response, AppError>) -> AppError {
        match result {
            Ok(res) => panic!("expected an error, got {}", res.status()),
            Err(e) => e,
        }
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn router_accepts_generate_handler() {
        let state = app_state(Arc::new(FakePlatform::default()), FakeDiscovery::tracks(1));
        let _app: Router = router().with_state(state);
    }

    #[tokio::test]
    async fn generate_happy_path() {
        let platform = Arc::new(FakePlatform::default());
        let state = app_state(platform, FakeDiscovery::tracks(4));
        let res = generate_playlist(
            State(state),
            Ok(Json(request("relaxing evening", "Chill", Some("good")))),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(SET_COOKIE).is_none());

        let body = json_body(res).await;
        assert_eq!(body["playlistUrl"], "https://platform.test/playlist/pl-1");
        assert_eq!(body["tracks"].as_array().unwrap().len(), 4);
        assert_eq!(body["tracks"][0]["name"], "track 0");
        assert_eq!(body["tags"], serde_json::json!(["pop", "indie", "chill"]));
        assert!(body.get("genres").is_none());
    }

    #[tokio::test]
    async fn missing_access_token_is_401_without_outbound_calls() {
        let platform = Arc::new(FakePlatform::default());
        let state = app_state(platform.clone(), FakeDiscovery::tracks(4));
        for access in [None, Some("  ")] {
            let err = rejected(
                generate_playlist(
                    State(state.clone()),
                    Ok(Json(request("relaxing evening", "Chill", access))),
                )
                .await,
            );
            let res = err.into_response();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert!(json_body(res).await["error"].is_string());
        }
        assert_eq!(platform.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_prompt_is_400() {
        let platform = Arc::new(FakePlatform::default());
        let state = app_state(platform.clone(), FakeDiscovery::tracks(4));
        let err = rejected(
            generate_playlist(State(state), Ok(Json(request("", "Chill", Some("good"))))).await,
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(platform.call_count(), 0);
    }

    #[tokio::test]
    async fn no_tracks_is_400() {
        let platform = Arc::new(FakePlatform::default());
        let state = app_state(platform, FakeDiscovery::tracks(0));
        let err = rejected(
            generate_playlist(State(state), Ok(Json(request("p", "n", Some("good"))))).await,
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refreshed_token_set_as_cookie() {
        let platform = Arc::new(FakePlatform {
            expired: vec!["old".into()],
            ..Default::default()
        });
        let state = app_state(platform, FakeDiscovery::tracks(1));
        let res = generate_playlist(State(state), Ok(Json(request("p", "n", Some("old")))))
            .await
            .unwrap();
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("access_token=fresh;"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn login_redirects_with_state_cookie() {
        let state = app_state(Arc::new(FakePlatform::default()), FakeDiscovery::tracks(0));
        let res = login(State(state)).await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let location = res.headers()[LOCATION].to_str().unwrap();
        let cookie = res.headers()[SET_COOKIE].to_str().unwrap();
        let sent_state = location.split("state=").nth(1).unwrap();
        assert!(cookie.starts_with(&format!("oauth_state={};", sent_state)));
    }

    fn callback_query(code: Option<&str>, state: Option<&str>) -> Query<CallbackQuery> {
        Query(CallbackQuery {
            code: code.map(String::from),
            state: state.map(String::from),
            error: None,
        })
    }

    fn state_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; oauth_state={}", value)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn callback_redirects_to_frontend_with_tokens() {
        let state = app_state(Arc::new(FakePlatform::default()), FakeDiscovery::tracks(0));
        let res = callback(
            State(state),
            callback_query(Some("abc"), Some("s1")),
            state_cookie("s1"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers()[LOCATION],
            "http://localhost:3001/?access_token=access-abc&refresh_token=refresh%20%26%20more"
        );
    }

    #[tokio::test]
    async fn callback_rejects_state_mismatch() {
        let platform = Arc::new(FakePlatform::default());
        let state = app_state(platform.clone(), FakeDiscovery::tracks(0));
        let res = callback(
            State(state.clone()),
            callback_query(Some("abc"), Some("s1")),
            state_cookie("other"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = callback(
            State(state),
            callback_query(Some("abc"), Some("s1")),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(platform.call_count(), 0);
    }

    #[tokio::test]
    async fn callback_missing_code_is_400() {
        let state = app_state(Arc::new(FakePlatform::default()), FakeDiscovery::tracks(0));
        let res = callback(
            State(state),
            callback_query(None, Some("s1")),
            state_cookie("s1"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_exchange_failure_is_500() {
        let platform = Arc::new(FakePlatform {
            exchange_fails: true,
            ..Default::default()
        });
        let state = app_state(platform, FakeDiscovery::tracks(0));
        let res = callback(
            State(state),
            callback_query(Some("abc"), Some("s1")),
            state_cookie("s1"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cookie_lookup() {
        let headers = state_cookie("xyz");
        assert_eq!(cookie(&headers, "oauth_state"), Some("xyz"));
        assert_eq!(cookie(&headers, "theme"), Some("dark"));
        assert_eq!(cookie(&headers, "missing"), None);
    }
}
