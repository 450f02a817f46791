use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/";
pub const DEFAULT_POSTER_SIZE: &str = "w500";
const DEFAULT_ADDR: &str = "0.0.0.0:3147";
const DEFAULT_DISCOVER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub image_base_url: String,
    pub poster_size: String,
    pub addr: SocketAddr,
    pub discover_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let tmdb_api_key = get("TMDB_API_KEY")
            .ok_or_else(|| anyhow::anyhow!("Missing required environment variable: TMDB_API_KEY"))?;
        let tmdb_base_url = get("TMDB_BASE_URL")
            .unwrap_or_else(|| DEFAULT_TMDB_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let image_base_url =
            get("TMDB_IMAGE_BASE_URL").unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_string());
        let poster_size =
            get("TMDB_POSTER_SIZE").unwrap_or_else(|| DEFAULT_POSTER_SIZE.to_string());

        let addr_raw = get("CINESCOUT_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("CINESCOUT_ADDR is not a socket address: {addr_raw}"))?;

        let discover_timeout = match get("DISCOVER_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("DISCOVER_TIMEOUT_SECS is not a number: {raw}"))?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_DISCOVER_TIMEOUT_SECS),
        };

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            image_base_url,
            poster_size,
            addr,
            discover_timeout,
        })
    }
}
