//! Parameter sets for the upstream discover endpoint.

use crate::models::{FilterSpec, GenreMatch};

/// Excludes obscure titles whose average rests on a handful of votes.
pub const MIN_VOTE_COUNT: u32 = 100;
pub const SORT_BY: &str = "vote_average.desc";

/// One page of a discover request. Optional filters that are unset never
/// appear in [`DiscoverQuery::params`].
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverQuery {
    page: u32,
    release_from: Option<String>,
    release_to: Option<String>,
    with_genres: Option<String>,
    min_rating: Option<f64>,
}

impl DiscoverQuery {
    /// `genre_ids` must already be resolved through the genre directory; an
    /// empty slice means no genre constraint upstream.
    ///
    /// In `Any` mode the ids are joined with `|` on purpose: TMDB treats a
    /// comma as AND, which would narrow results before the local OR filter.
    pub fn build(spec: &FilterSpec, genre_ids: &[i32], page: u32) -> Self {
        let with_genres = if genre_ids.is_empty() {
            None
        } else {
            // TMDB reads `|` as OR and `,` as AND.
            let sep = match spec.genre_match {
                GenreMatch::Any => "|",
                GenreMatch::All => ",",
            };
            Some(
                genre_ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(sep),
            )
        };

        Self {
            page: page.max(1),
            release_from: spec.start_year.map(|y| format!("{y:04}-01-01")),
            release_to: spec.end_year.map(|y| format!("{y:04}-12-31")),
            with_genres,
            min_rating: spec.minimum_rating,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("include_adult", "false".to_string()),
            ("vote_count.gte", MIN_VOTE_COUNT.to_string()),
        ];
        if let Some(from) = &self.release_from {
            params.push(("primary_release_date.gte", from.clone()));
        }
        if let Some(to) = &self.release_to {
            params.push(("primary_release_date.lte", to.clone()));
        }
        if let Some(genres) = &self.with_genres {
            params.push(("with_genres", genres.clone()));
        }
        if let Some(rating) = self.min_rating {
            params.push(("vote_average.gte", rating.to_string()));
        }
        params.push(("sort_by", SORT_BY.to_string()));
        params
    }
}

/// Queries for pages `1..=page_count`.
pub fn page_queries(spec: &FilterSpec, genre_ids: &[i32], page_count: u32) -> Vec<DiscoverQuery> {
    (1..=page_count)
        .map(|page| DiscoverQuery::build(spec, genre_ids, page))
        .collect()
}
