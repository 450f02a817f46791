//! Merge, dedupe, filter, rank and cap discover results.

use chrono::Datelike;
use std::collections::HashSet;

use crate::genres::GenreDirectory;
use crate::models::{FilterSpec, GenreMatch, Movie, RawMovieRecord};
use crate::project::{project, PosterConfig};

pub const MAX_RESULTS: usize = 50;

/// Pages must be given in page order: on duplicate ids the first record
/// encountered wins.
pub fn aggregate(
    pages: Vec<Vec<RawMovieRecord>>,
    spec: &FilterSpec,
    directory: &GenreDirectory,
    posters: &PosterConfig,
) -> Vec<Movie> {
    let mut kept = dedupe(pages.into_iter().flatten());
    kept.retain(|record| matches_filter(record, spec, directory));
    // Stable: equal ratings keep dedupe order.
    kept.sort_by(|a, b| b.vote_average.total_cmp(&a.vote_average));
    kept.truncate(MAX_RESULTS);
    kept.iter()
        .map(|record| project(record, directory, posters))
        .collect()
}

fn dedupe(records: impl Iterator<Item = RawMovieRecord>) -> Vec<RawMovieRecord> {
    let mut seen = HashSet::new();
    records.filter(|r| seen.insert(r.id)).collect()
}

pub fn matches_filter(
    record: &RawMovieRecord,
    spec: &FilterSpec,
    directory: &GenreDirectory,
) -> bool {
    let year = record.release_date.map(|d| d.year());

    if let Some(start) = spec.start_year {
        if !year.is_some_and(|y| y >= start) {
            return false;
        }
    }
    if let Some(end) = spec.end_year {
        if !year.is_some_and(|y| y <= end) {
            return false;
        }
    }
    if let Some(min) = spec.minimum_rating {
        if record.vote_average < min {
            return false;
        }
    }
    matches_genres(record, spec, directory)
}

fn matches_genres(record: &RawMovieRecord, spec: &FilterSpec, directory: &GenreDirectory) -> bool {
    // Without a catalog the names cannot be checked at all.
    if spec.selected_genres.is_empty() || !directory.is_available() {
        return true;
    }
    let names = directory.resolve(&record.genre_ids);
    match spec.genre_match {
        GenreMatch::Any => names.iter().any(|n| spec.selected_genres.contains(n)),
        GenreMatch::All => spec
            .selected_genres
            .iter()
            .all(|wanted| names.contains(wanted)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;
    use chrono::NaiveDate;

    fn directory() -> GenreDirectory {
        GenreDirectory::preloaded(vec![
            Genre {
                id: 1,
                name: "Action".to_string(),
            },
            Genre {
                id: 2,
                name: "Drama".to_string(),
            },
            Genre {
                id: 3,
                name: "Comedy".to_string(),
            },
        ])
    }

    fn rec(id: i32, rating: f64, year: Option<i32>, genres: &[i32]) -> RawMovieRecord {
        RawMovieRecord {
            id,
            title: format!("Movie {id}"),
            overview: String::new(),
            poster_path: format!("/{id}.jpg"),
            release_date: year.and_then(|y| NaiveDate::from_ymd_opt(y, 6, 1)),
            vote_average: rating,
            genre_ids: genres.to_vec(),
        }
    }

    fn genres(names: &[&str]) -> std::collections::BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn run(pages: Vec<Vec<RawMovieRecord>>, spec: &FilterSpec) -> Vec<Movie> {
        aggregate(pages, spec, &directory(), &PosterConfig::default())
    }

    #[test]
    fn dedupes_and_ranks() {
        let pages = vec![
            vec![rec(1, 7.2, Some(2010), &[1]), rec(1, 7.2, Some(2010), &[1])],
            vec![rec(2, 8.5, Some(2015), &[2])],
        ];
        let spec = FilterSpec {
            minimum_rating: Some(5.0),
            ..Default::default()
        };
        let out = run(pages, &spec);
        let ids: Vec<i32> = out.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(out[0].genres, vec!["Drama"]);
        assert_eq!(out[1].genres, vec!["Action"]);
    }

    #[test]
    fn first_duplicate_wins_across_pages() {
        let mut later = rec(7, 9.9, Some(2000), &[2]);
        later.title = "Later copy".to_string();
        let pages = vec![vec![rec(7, 6.0, Some(2000), &[1])], vec![later]];
        let out = run(pages, &FilterSpec::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Movie 7");
        assert_eq!(out[0].vote_average, 6.0);
    }

    #[test]
    fn missing_date_fails_any_year_bound() {
        let pages = vec![vec![rec(1, 7.0, None, &[])]];
        let start = FilterSpec {
            start_year: Some(2020),
            ..Default::default()
        };
        let end = FilterSpec {
            end_year: Some(2030),
            ..Default::default()
        };
        assert!(run(pages.clone(), &start).is_empty());
        assert!(run(pages.clone(), &end).is_empty());
        assert_eq!(run(pages, &FilterSpec::default()).len(), 1);
    }

    #[test]
    fn year_bounds_are_inclusive_and_independent() {
        let pages = vec![vec![
            rec(1, 5.0, Some(1999), &[]),
            rec(2, 5.0, Some(2000), &[]),
            rec(3, 5.0, Some(2005), &[]),
            rec(4, 5.0, Some(2006), &[]),
        ]];
        let spec = FilterSpec {
            start_year: Some(2000),
            end_year: Some(2005),
            ..Default::default()
        };
        let ids: Vec<i32> = run(pages.clone(), &spec).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let inverted = FilterSpec {
            start_year: Some(2006),
            end_year: Some(1999),
            ..Default::default()
        };
        assert!(run(pages, &inverted).is_empty());
    }

    #[test]
    fn rating_floor_is_inclusive() {
        let pages = vec![vec![rec(1, 6.9, Some(2000), &[]), rec(2, 7.0, Some(2000), &[])]];
        let spec = FilterSpec {
            minimum_rating: Some(7.0),
            ..Default::default()
        };
        let ids: Vec<i32> = run(pages, &spec).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn any_genre_match_is_default() {
        let spec = FilterSpec {
            selected_genres: genres(&["Action"]),
            ..Default::default()
        };
        let d = directory();
        assert!(matches_filter(&rec(1, 5.0, None, &[1, 2]), &spec, &d));
        assert!(!matches_filter(&rec(2, 5.0, None, &[2]), &spec, &d));
        assert!(!matches_filter(&rec(3, 5.0, None, &[]), &spec, &d));
    }

    #[test]
    fn all_genre_match_requires_every_selection() {
        let spec = FilterSpec {
            selected_genres: genres(&["Action", "Drama"]),
            genre_match: GenreMatch::All,
            ..Default::default()
        };
        let d = directory();
        assert!(matches_filter(&rec(1, 5.0, None, &[2, 1, 3]), &spec, &d));
        assert!(!matches_filter(&rec(2, 5.0, None, &[1]), &spec, &d));
    }

    #[test]
    fn genre_filter_is_skipped_without_catalog() {
        let spec = FilterSpec {
            selected_genres: genres(&["Action"]),
            ..Default::default()
        };
        let out = aggregate(
            vec![vec![rec(1, 5.0, None, &[2])]],
            &spec,
            &GenreDirectory::new(),
            &PosterConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].genres.is_empty());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(run(Vec::new(), &FilterSpec::default()).is_empty());
        assert!(run(vec![Vec::new(); 5], &FilterSpec::default()).is_empty());
    }

    #[test]
    fn output_is_capped_sorted_and_unique() {
        // 5 pages of 20 with overlapping ids and repeating ratings.
        let pages: Vec<Vec<RawMovieRecord>> = (0..5)
            .map(|page| {
                (0..20)
                    .map(|i| {
                        let id = page * 15 + i;
                        let rating = ((id * 37) % 100) as f64 / 10.0;
                        rec(id, rating, Some(1990 + id % 30), &[1 + id % 3])
                    })
                    .collect()
            })
            .collect();
        let spec = FilterSpec {
            minimum_rating: Some(2.0),
            start_year: Some(1995),
            ..Default::default()
        };

        let out = run(pages.clone(), &spec);
        assert!(out.len() <= MAX_RESULTS);
        assert_eq!(out.len(), MAX_RESULTS);
        assert!(out
            .windows(2)
            .all(|w| w[0].vote_average >= w[1].vote_average));
        let unique: HashSet<i32> = out.iter().map(|m| m.id).collect();
        assert_eq!(unique.len(), out.len());
        assert!(out.iter().all(|m| m.vote_average >= 2.0));
        assert!(out.iter().all(|m| m.release_date.year() >= 1995));

        assert_eq!(run(pages, &spec), out);
    }

    #[test]
    fn ties_keep_dedupe_order() {
        let pages = vec![
            vec![rec(10, 7.0, None, &[]), rec(11, 8.0, None, &[])],
            vec![rec(12, 7.0, None, &[]), rec(13, 7.0, None, &[])],
        ];
        let ids: Vec<i32> = run(pages, &FilterSpec::default())
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![11, 10, 12, 13]);
    }
}
