use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::models::Genre;
use crate::tmdb::TmdbApi;

/// Names offered to a filter form when the upstream catalog cannot be loaded.
pub const FALLBACK_GENRES: [&str; 18] = [
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "History",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "Science Fiction",
    "Thriller",
    "War",
    "Western",
];

#[derive(Debug, Default)]
struct Catalog {
    names: HashMap<i32, String>,
    failure: Option<String>,
}

/// Genre id to name table, populated once per process.
///
/// The first caller of [`GenreDirectory::ensure_loaded`] fetches the catalog;
/// concurrent callers wait on that same fetch. A failed fetch is remembered
/// too: the directory stays empty and is not retried.
#[derive(Debug, Default)]
pub struct GenreDirectory {
    catalog: OnceCell<Catalog>,
}

impl GenreDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preloaded(genres: impl IntoIterator<Item = Genre>) -> Self {
        let names = genres.into_iter().map(|g| (g.id, g.name)).collect();
        Self {
            catalog: OnceCell::new_with(Some(Catalog {
                names,
                failure: None,
            })),
        }
    }

    /// Returns an error when the catalog is unavailable. The error is a
    /// degradation notice; lookups keep working and simply find nothing.
    pub async fn ensure_loaded(&self, api: &dyn TmdbApi) -> Result<()> {
        let catalog = self
            .catalog
            .get_or_init(|| async {
                match api.fetch_genres().await {
                    Ok(genres) => {
                        info!(genre_count = genres.len(), "Loaded genre catalog");
                        Catalog {
                            names: genres.into_iter().map(|g| (g.id, g.name)).collect(),
                            failure: None,
                        }
                    }
                    Err(e) => {
                        warn!("Genre catalog unavailable, genre names disabled: {:#}", e);
                        Catalog {
                            names: HashMap::new(),
                            failure: Some(format!("{e:#}")),
                        }
                    }
                }
            })
            .await;

        match &catalog.failure {
            Some(reason) => Err(anyhow!("genre catalog unavailable: {}", reason)),
            None => Ok(()),
        }
    }

    /// True once a catalog fetch has succeeded.
    pub fn is_available(&self) -> bool {
        self.catalog
            .get()
            .map(|c| c.failure.is_none())
            .unwrap_or(false)
    }

    pub fn name(&self, id: i32) -> Option<&str> {
        self.catalog
            .get()
            .and_then(|c| c.names.get(&id))
            .map(String::as_str)
    }

    /// Maps ids to names in input order, dropping unknown ids.
    pub fn resolve(&self, ids: &[i32]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.name(*id))
            .map(str::to_string)
            .collect()
    }

    /// Ids whose names appear in `names`, ascending. Unknown names are skipped.
    pub fn ids_for_names(&self, names: &BTreeSet<String>) -> Vec<i32> {
        let Some(catalog) = self.catalog.get() else {
            return Vec::new();
        };
        let mut ids: Vec<i32> = catalog
            .names
            .iter()
            .filter(|(_, name)| names.contains(*name))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All known names, alphabetical.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .catalog
            .get()
            .map(|c| c.names.values().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }
}
