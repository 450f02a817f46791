//! Run one discovery against the live TMDB API and print the outcome.
//! Usage:
//!   cargo run --bin discover_probe -- [--start-year N] [--end-year N] [--min-rating X] [--genre NAME]... [--all]
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{anyhow, Context, Result};
use cinescout::config::Settings;
use cinescout::discover::DiscoveryService;
use cinescout::models::{FilterSpec, GenreMatch};
use cinescout::tmdb::{TmdbApi, TmdbClient};
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn parse_args(args: &[String]) -> Result<FilterSpec> {
    let mut spec = FilterSpec::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| anyhow!("missing value for {}", flag))
        };
        match flag.as_str() {
            "--start-year" => {
                spec.start_year = Some(value()?.parse().context("start year must be an integer")?)
            }
            "--end-year" => {
                spec.end_year = Some(value()?.parse().context("end year must be an integer")?)
            }
            "--min-rating" => {
                spec.minimum_rating = Some(value()?.parse().context("rating must be a number")?)
            }
            "--genre" => {
                spec.selected_genres.insert(value()?.clone());
            }
            "--all" => spec.genre_match = GenreMatch::All,
            other => return Err(anyhow!("unknown argument '{}'", other)),
        }
    }
    Ok(spec)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().skip(1).collect();
    let spec = match parse_args(&args) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Usage: cargo run --bin discover_probe -- [--start-year N] [--end-year N] [--min-rating X] [--genre NAME]... [--all]");
            std::process::exit(1);
        }
    };

    let settings = Settings::from_env()?;
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_settings(&settings)?);
    let discovery = DiscoveryService::from_settings(tmdb, &settings);

    let outcome = discovery.discover(&spec, &CancellationToken::new()).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    eprintln!(
        "{} movies, {} warnings",
        outcome.movies().len(),
        outcome.warnings().len()
    );
    Ok(())
}
