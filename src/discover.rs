use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::fetch::{fetch_pages, PageOutcome, DISCOVER_PAGES};
use crate::genres::{GenreDirectory, FALLBACK_GENRES};
use crate::models::{FilterSpec, Movie};
use crate::pipeline::aggregate;
use crate::project::PosterConfig;
use crate::query::page_queries;
use crate::tmdb::TmdbApi;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryWarning {
    GenreCatalogUnavailable { reason: String },
    PageFailed { page: u32, reason: String },
    PageCancelled { page: u32 },
    Aborted { reason: String },
}

/// What a discovery hands back. Failures never escape; they show up as
/// warnings next to whatever movies could still be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoverOutcome {
    Complete {
        movies: Vec<Movie>,
    },
    Degraded {
        movies: Vec<Movie>,
        warnings: Vec<DiscoveryWarning>,
    },
}

impl DiscoverOutcome {
    fn new(movies: Vec<Movie>, warnings: Vec<DiscoveryWarning>) -> Self {
        if warnings.is_empty() {
            DiscoverOutcome::Complete { movies }
        } else {
            DiscoverOutcome::Degraded { movies, warnings }
        }
    }

    pub fn movies(&self) -> &[Movie] {
        match self {
            DiscoverOutcome::Complete { movies } | DiscoverOutcome::Degraded { movies, .. } => {
                movies
            }
        }
    }

    pub fn warnings(&self) -> &[DiscoveryWarning] {
        match self {
            DiscoverOutcome::Complete { .. } => &[],
            DiscoverOutcome::Degraded { warnings, .. } => warnings,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, DiscoverOutcome::Degraded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreSource {
    Upstream,
    Fallback,
}

pub struct DiscoveryService {
    tmdb: Arc<dyn TmdbApi>,
    genres: Arc<GenreDirectory>,
    posters: PosterConfig,
    timeout: Duration,
    page_count: u32,
}

impl DiscoveryService {
    pub fn new(
        tmdb: Arc<dyn TmdbApi>,
        genres: Arc<GenreDirectory>,
        posters: PosterConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            tmdb,
            genres,
            posters,
            timeout,
            page_count: DISCOVER_PAGES,
        }
    }

    pub fn from_settings(tmdb: Arc<dyn TmdbApi>, settings: &Settings) -> Self {
        Self::new(
            tmdb,
            Arc::new(GenreDirectory::new()),
            PosterConfig {
                image_base_url: settings.image_base_url.clone(),
                size: settings.poster_size.clone(),
            },
            settings.discover_timeout,
        )
    }

    /// Genre names for building a filter form, falling back to a static list
    /// when the catalog is unavailable.
    pub async fn genre_names(&self) -> (Vec<String>, GenreSource) {
        match self.genres.ensure_loaded(self.tmdb.as_ref()).await {
            Ok(()) => (self.genres.names(), GenreSource::Upstream),
            Err(_) => (
                FALLBACK_GENRES.iter().map(|g| g.to_string()).collect(),
                GenreSource::Fallback,
            ),
        }
    }

    pub async fn discover(&self, spec: &FilterSpec, cancel: &CancellationToken) -> DiscoverOutcome {
        let mut warnings = Vec::new();

        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warnings.push(DiscoveryWarning::Aborted {
                    reason: "cancelled while loading the genre catalog".to_string(),
                });
                return DiscoverOutcome::new(Vec::new(), warnings);
            }
            res = self.genres.ensure_loaded(self.tmdb.as_ref()) => res,
        };
        if let Err(e) = loaded {
            warnings.push(DiscoveryWarning::GenreCatalogUnavailable {
                reason: format!("{e:#}"),
            });
        }

        let genre_ids = self.genres.ids_for_names(&spec.selected_genres);
        if !spec.selected_genres.is_empty() && self.genres.is_available() && genre_ids.is_empty() {
            info!(
                genres = ?spec.selected_genres,
                "No known genre among the selection, nothing can match"
            );
            return DiscoverOutcome::new(Vec::new(), warnings);
        }

        let queries = page_queries(spec, &genre_ids, self.page_count);
        let outcomes = fetch_pages(self.tmdb.as_ref(), &queries, cancel, self.timeout).await;

        let mut pages = Vec::with_capacity(outcomes.len());
        let mut cancelled = 0;
        for outcome in outcomes {
            match outcome {
                PageOutcome::Fetched { records, .. } => pages.push(records),
                PageOutcome::Failed { page, reason } => {
                    warnings.push(DiscoveryWarning::PageFailed { page, reason })
                }
                PageOutcome::Cancelled { page } => {
                    cancelled += 1;
                    warnings.push(DiscoveryWarning::PageCancelled { page })
                }
            }
        }
        // Per-page warnings stay; the abort marker is added next to them.
        if cancelled > 0 && pages.is_empty() {
            let reason = format!(
                "discovery cancelled before any page completed ({cancelled} pages pending)"
            );
            warn!("Discovery aborted: {}", reason);
            warnings.push(DiscoveryWarning::Aborted { reason });
        }

        let pages_ok = pages.len();
        let records: usize = pages.iter().map(Vec::len).sum();
        let movies = aggregate(pages, spec, &self.genres, &self.posters);
        info!(
            pages_ok,
            records,
            kept = movies.len(),
            warnings = warnings.len(),
            "Discovery finished"
        );
        debug!(spec = ?spec, "Discovery filters");

        DiscoverOutcome::new(movies, warnings)
    }
}
