use futures::future::join_all;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::RawMovieRecord;
use crate::query::DiscoverQuery;
use crate::tmdb::TmdbApi;

/// Pages requested per discovery. Every page is fetched even when an earlier
/// one comes back short.
pub const DISCOVER_PAGES: u32 = 5;

#[derive(Debug)]
pub enum PageOutcome {
    Fetched {
        page: u32,
        records: Vec<RawMovieRecord>,
    },
    Failed {
        page: u32,
        reason: String,
    },
    /// Deadline or caller cancellation arrived first.
    Cancelled {
        page: u32,
    },
}

impl PageOutcome {
    pub fn page(&self) -> u32 {
        match self {
            PageOutcome::Fetched { page, .. }
            | PageOutcome::Failed { page, .. }
            | PageOutcome::Cancelled { page } => *page,
        }
    }
}

/// Fetches every query concurrently and returns one outcome per query, in
/// query order regardless of completion order.
///
/// Never fails as a whole: a page that errored, timed out or was cancelled
/// is reported in its own slot so callers keep the per-page reasons.
pub async fn fetch_pages(
    api: &dyn TmdbApi,
    queries: &[DiscoverQuery],
    cancel: &CancellationToken,
    timeout: Duration,
) -> Vec<PageOutcome> {
    let deadline = Instant::now() + timeout;

    let fetches = queries.iter().map(|query| async move {
        let page = query.page();
        debug!(page, params = ?query.params(), "Requesting discover page");
        tokio::select! {
            biased;
            result = api.discover_page(query) => match result {
                Ok(records) => {
                    debug!(page, records = records.len(), "Fetched discover page");
                    PageOutcome::Fetched { page, records }
                }
                Err(e) => {
                    warn!(page, "Discover page failed: {:#}", e);
                    PageOutcome::Failed { page, reason: format!("{e:#}") }
                }
            },
            _ = cancel.cancelled() => PageOutcome::Cancelled { page },
            _ = tokio::time::sleep_until(deadline) => {
                warn!(page, "Discover page timed out after {:?}", timeout);
                PageOutcome::Cancelled { page }
            }
        }
    });

    join_all(fetches).await
}
