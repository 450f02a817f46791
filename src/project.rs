use chrono::NaiveDate;

use crate::config::{DEFAULT_IMAGE_BASE, DEFAULT_POSTER_SIZE};
use crate::genres::GenreDirectory;
use crate::models::{Movie, RawMovieRecord};

/// How poster URLs are composed: `base + size + poster_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterConfig {
    pub image_base_url: String,
    pub size: String,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            image_base_url: DEFAULT_IMAGE_BASE.to_string(),
            size: DEFAULT_POSTER_SIZE.to_string(),
        }
    }
}

impl PosterConfig {
    pub fn poster_url(&self, poster_path: &str) -> String {
        format!("{}{}{}", self.image_base_url, self.size, poster_path)
    }
}

/// Stand-in for a missing or unparseable release date.
pub fn release_date_sentinel() -> NaiveDate {
    NaiveDate::default()
}

pub fn project(
    record: &RawMovieRecord,
    directory: &GenreDirectory,
    posters: &PosterConfig,
) -> Movie {
    Movie {
        id: record.id,
        title: record.title.clone(),
        overview: record.overview.clone(),
        poster_path: record.poster_path.clone(),
        release_date: record.release_date.unwrap_or_else(release_date_sentinel),
        vote_average: record.vote_average,
        genres: directory.resolve(&record.genre_ids),
        poster_url: posters.poster_url(&record.poster_path),
    }
}
