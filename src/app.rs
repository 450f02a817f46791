use crate::config::Settings;
use crate::discover::{DiscoverOutcome, DiscoveryService};
use crate::models::{FilterSpec, GenreMatch};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::{str::FromStr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap

#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<DiscoveryService>,
    /// Cancelled on shutdown; every request works on a child token.
    pub shutdown: CancellationToken,
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_settings(&settings)?);
    let discovery = Arc::new(DiscoveryService::from_settings(tmdb, &settings));

    let (names, source) = discovery.genre_names().await;
    info!("Genre list ready: {} names ({:?})", names.len(), source);

    let shutdown = CancellationToken::new();
    let state = AppState {
        discovery,
        shutdown: shutdown.clone(),
    };
    let app = build_router(state);

    info!("Listening on {}", settings.addr);
    let listener = tokio::net::TcpListener::bind(settings.addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/genres", get(list_genres))
        .route("/api/discover", get(discover_query).post(discover_json))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn list_genres(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (genres, source) = state.discovery.genre_names().await;
    Json(json!({ "genres": genres, "source": source }))
}

async fn discover_json(
    State(state): State<AppState>,
    payload: Result<Json<FilterSpec>, JsonRejection>,
) -> Response {
    let spec = match payload {
        Ok(Json(spec)) => spec,
        Err(rejection) => return bad_request(anyhow!(rejection.body_text())),
    };
    if let Err(e) = validate(&spec) {
        return bad_request(e);
    }
    run_discovery(&state, &spec).await.into_response()
}

/// Reads the raw pairs rather than a struct so that a multi-select form's
/// repeated `genres` keys all count.
async fn discover_query(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(rejection) => return bad_request(anyhow!(rejection.body_text())),
    };
    let spec = match DiscoverParams::from_pairs(pairs)
        .and_then(DiscoverParams::into_filter)
        .and_then(|spec| {
            validate(&spec)?;
            Ok(spec)
        }) {
        Ok(spec) => spec,
        Err(e) => return bad_request(e),
    };
    run_discovery(&state, &spec).await.into_response()
}

async fn run_discovery(state: &AppState, spec: &FilterSpec) -> Json<DiscoverOutcome> {
    let cancel = state.shutdown.child_token();
    let outcome = state.discovery.discover(spec, &cancel).await;
    if outcome.is_degraded() {
        warn!(
            warnings = outcome.warnings().len(),
            "Returning degraded discovery result"
        );
    }
    Json(outcome)
}

fn bad_request(e: anyhow::Error) -> Response {
    warn!("Rejecting discover request: {:#}", e);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": format!("{e:#}")})),
    )
        .into_response()
}

fn validate(spec: &FilterSpec) -> Result<()> {
    if let Some(rating) = spec.minimum_rating {
        if !rating.is_finite() {
            return Err(anyhow!("min_rating must be a finite number"));
        }
    }
    Ok(())
}

/// Query-string form of [`FilterSpec`]. Values arrive as strings so that the
/// blank fields an HTML form submits can be treated as unset.
#[derive(Debug, Default)]
pub struct DiscoverParams {
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    /// Every `genres` value in arrival order; each may itself be comma
    /// separated.
    pub genres: Vec<String>,
    pub min_rating: Option<String>,
    pub genre_match: Option<String>,
}

impl DiscoverParams {
    /// Unknown keys are ignored. Only `genres` may repeat.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "genres" => {
                    params.genres.push(value);
                    continue;
                }
                "start_year" => &mut params.start_year,
                "end_year" => &mut params.end_year,
                "min_rating" => &mut params.min_rating,
                "genre_match" => &mut params.genre_match,
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return Err(anyhow!("{} given more than once", key));
            }
        }
        Ok(params)
    }

    pub fn into_filter(self) -> Result<FilterSpec> {
        let genre_match = match non_blank(&self.genre_match) {
            None => GenreMatch::default(),
            Some(raw) if raw.eq_ignore_ascii_case("any") => GenreMatch::Any,
            Some(raw) if raw.eq_ignore_ascii_case("all") => GenreMatch::All,
            Some(raw) => return Err(anyhow!("genre_match must be 'any' or 'all', got '{}'", raw)),
        };
        let selected_genres = self
            .genres
            .iter()
            .flat_map(|raw| raw.split(','))
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();

        Ok(FilterSpec {
            start_year: parse_field("start_year", &self.start_year)?,
            end_year: parse_field("end_year", &self.end_year)?,
            selected_genres,
            minimum_rating: parse_field("min_rating", &self.min_rating)?,
            genre_match,
        })
    }
}

fn non_blank(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_field<T>(name: &str, raw: &Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_blank(raw)
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| anyhow!("{} is invalid ('{}'): {}", name, s, e))
        })
        .transpose()
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> DiscoverParams {
        let pairs = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DiscoverParams::from_pairs(pairs).unwrap()
    }

    #[test]
    fn blank_form_fields_are_unset() {
        let spec = params(&[
            ("start_year", ""),
            ("end_year", " "),
            ("genres", ""),
            ("min_rating", ""),
            ("genre_match", ""),
        ])
        .into_filter()
        .unwrap();
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn parses_full_query() {
        let spec = params(&[
            ("start_year", "1990"),
            ("end_year", "1999"),
            ("genres", "Drama, Science Fiction,,"),
            ("min_rating", "7.5"),
            ("genre_match", "ALL"),
        ])
        .into_filter()
        .unwrap();
        assert_eq!(spec.start_year, Some(1990));
        assert_eq!(spec.end_year, Some(1999));
        assert_eq!(spec.minimum_rating, Some(7.5));
        assert_eq!(spec.genre_match, GenreMatch::All);
        let genres: Vec<&str> = spec.selected_genres.iter().map(String::as_str).collect();
        assert_eq!(genres, vec!["Drama", "Science Fiction"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(params(&[("start_year", "nineties")]).into_filter().is_err());
        assert!(params(&[("genre_match", "some")]).into_filter().is_err());
        let nan = params(&[("min_rating", "NaN")]).into_filter().unwrap();
        assert!(validate(&nan).is_err());
    }

    #[test]
    fn repeated_genre_keys_accumulate() {
        let spec = params(&[
            ("genres", "Action"),
            ("genres", "Drama,Comedy"),
            ("genres", ""),
            ("utm_source", "mail"),
        ])
        .into_filter()
        .unwrap();
        let genres: Vec<&str> = spec.selected_genres.iter().map(String::as_str).collect();
        assert_eq!(genres, vec!["Action", "Comedy", "Drama"]);
    }

    #[test]
    fn repeated_scalar_key_is_rejected() {
        let pairs = vec![
            ("start_year".to_string(), "1990".to_string()),
            ("start_year".to_string(), "2000".to_string()),
        ];
        let err = DiscoverParams::from_pairs(pairs).unwrap_err();
        assert!(err.to_string().contains("start_year"));
    }
}
