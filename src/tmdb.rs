use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::Settings;
use crate::models::{Genre, RawMovieRecord};
use crate::query::DiscoverQuery;

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    /// Full movie genre catalog.
    async fn fetch_genres(&self) -> Result<Vec<Genre>>;
    /// One page of the discover endpoint, normalized.
    async fn discover_page(&self, query: &DiscoverQuery) -> Result<Vec<RawMovieRecord>>;
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("TMDB API key cannot be empty"));
        }
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.tmdb_api_key.clone(), settings.tmdb_base_url.clone())
    }

    async fn get_text(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        check_status(path, status, text)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn fetch_genres(&self) -> Result<Vec<Genre>> {
        let params = [("language", "en-US".to_string())];
        let text = self.get_text("/genre/movie/list", &params).await?;
        parse_genre_list(&text)
    }

    async fn discover_page(&self, query: &DiscoverQuery) -> Result<Vec<RawMovieRecord>> {
        let text = self.get_text("/discover/movie", &query.params()).await?;
        parse_discover_page(&text).with_context(|| format!("discover page {}", query.page()))
    }
}

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    results: Vec<DiscoverResult>,
}

#[derive(Debug, Deserialize)]
struct DiscoverResult {
    id: i32,
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    vote_average: Option<f64>,
    genre_ids: Option<Vec<i32>>,
}

impl From<DiscoverResult> for RawMovieRecord {
    fn from(r: DiscoverResult) -> Self {
        RawMovieRecord {
            id: r.id,
            title: r.title.unwrap_or_default(),
            overview: r.overview.unwrap_or_default(),
            poster_path: r.poster_path.unwrap_or_default(),
            release_date: r.release_date.as_deref().and_then(parse_release_date),
            vote_average: r.vote_average.unwrap_or_default(),
            genre_ids: r.genre_ids.unwrap_or_default(),
        }
    }
}

pub fn parse_genre_list(body: &str) -> Result<Vec<Genre>> {
    let list: GenreList = serde_json::from_str(body).context("JSON parse failed")?;
    Ok(list.genres)
}

pub fn parse_discover_page(body: &str) -> Result<Vec<RawMovieRecord>> {
    let page: DiscoverResponse = serde_json::from_str(body).context("JSON parse failed")?;
    Ok(page.results.into_iter().map(RawMovieRecord::from).collect())
}

/// Upstream sends `YYYY-MM-DD`, an empty string, or nothing at all.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Passes a success body through. Anything else becomes
/// `"{path} -> {status}: {first 200 chars of body}"`, which is the reason
/// surfaced in page warnings.
fn check_status(path: &str, status: StatusCode, body: String) -> Result<String> {
    if !status.is_success() {
        return Err(anyhow!("{} -> {}: {}", path, status, snippet(&body)));
    }
    Ok(body)
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
