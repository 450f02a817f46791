use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filters applied to one discovery. Every field is optional; an empty spec
/// discovers the best-rated titles upstream has to offer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    #[serde(rename = "genres")]
    pub selected_genres: BTreeSet<String>,
    #[serde(rename = "min_rating")]
    pub minimum_rating: Option<f64>,
    pub genre_match: GenreMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreMatch {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

/// A discover result as upstream returned it, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMovieRecord {
    pub id: i32,
    pub title: String,
    pub overview: String,
    pub poster_path: String,
    pub release_date: Option<NaiveDate>,
    pub vote_average: f64,
    pub genre_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    pub overview: String,
    pub poster_path: String,
    pub release_date: NaiveDate,
    pub vote_average: f64,
    pub genres: Vec<String>,
    pub poster_url: String,
}
