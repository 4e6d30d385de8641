//! Source Extractor — walks a paginated results listing and collects cards.
//!
//! One run owns one browser session. The session is closed on every exit
//! path: normal completion, early stop, error, and panic.
//!
//! Paging rules:
//! 1. Load the target once. A failed load is the only run-level error after
//!    launch; nothing has been collected yet.
//! 2. For each page: wait for the results to settle (pages after the first),
//!    wait for listing cards, parse up to the per-page cap, then click "next".
//! 3. Any later failure stops paging but keeps what was collected, tagged
//!    with a `StopReason`.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::models::{ExtractedListing, StopReason, MISSING_TEXT};
use crate::ingest::parser::{
    classify_stop, count_listings, fingerprint, parse_listings, CompiledSelectors,
};
use crate::ingest::source::{ListingSource, PageSnapshot, SourceError, SourceLauncher};
use crate::ingest::wait::WaitPolicy;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to start browser session: {0}")]
    Launch(#[source] SourceError),

    #[error("Failed to load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: SourceError,
    },
}

/// Everything one extraction run needs to know.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub target_url: String,
    pub max_pages: u32,
    pub listings_per_page: usize,
    pub navigation_timeout: Duration,
    /// Bounds the wait for listing cards to appear on a page.
    pub selector_wait: WaitPolicy,
    /// Bounds the wait for a new result set after clicking "next".
    pub settle_wait: WaitPolicy,
    pub selectors: CompiledSelectors,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub listings: Vec<ExtractedListing>,
    /// Title of the last page looked at, for diagnosing selector drift.
    pub page_title: String,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// Launches a session, extracts, and always closes the session.
pub async fn run_extraction(
    launcher: &dyn SourceLauncher,
    plan: &ExtractionPlan,
) -> Result<ExtractionOutcome, ExtractError> {
    let mut source = launcher.launch().await.map_err(ExtractError::Launch)?;

    let result = AssertUnwindSafe(extract_pages(source.as_mut(), plan))
        .catch_unwind()
        .await;

    if let Err(e) = source.close().await {
        warn!("Failed to close browser session: {e}");
    }

    match result {
        Ok(outcome) => outcome,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Runs the paging loop against an already launched session.
pub async fn extract_pages(
    source: &mut dyn ListingSource,
    plan: &ExtractionPlan,
) -> Result<ExtractionOutcome, ExtractError> {
    info!("Navigating to {}", plan.target_url);
    source
        .open(&plan.target_url, plan.navigation_timeout)
        .await
        .map_err(|source| ExtractError::Navigation {
            url: plan.target_url.clone(),
            source,
        })?;

    let mut listings = Vec::new();
    let mut page_title = MISSING_TEXT.to_string();
    let mut pages_visited = 0;
    let mut previous_page: Option<String> = None;
    let mut stop_reason = StopReason::PageLimit;

    for page in 1..=plan.max_pages {
        info!("Scraping page {page} of at most {}", plan.max_pages);

        if page > 1 {
            match wait_for_settle(source, plan, previous_page.as_deref()).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Results did not change after clicking next on page {}", page - 1);
                    stop_reason =
                        StopReason::TransientFailure("results did not change after next".to_string());
                    break;
                }
                Err(e) => {
                    stop_reason = stop_for_error("waiting for next page", &e);
                    break;
                }
            }
        }

        let (snapshot, found) = match wait_for_listings(source, plan).await {
            Ok(waited) => waited,
            Err(e) => {
                stop_reason = stop_for_error("reading page", &e);
                break;
            }
        };
        page_title = snapshot.title.clone();
        debug!("Page title for page {page}: {page_title}");

        if !found {
            stop_reason = classify_stop(snapshot.status, &snapshot.html);
            warn!("No listings appeared on page {page}: {stop_reason:?}");
            break;
        }

        let base_url = if snapshot.url.is_empty() {
            plan.target_url.as_str()
        } else {
            snapshot.url.as_str()
        };
        let page_listings = parse_listings(
            &snapshot.html,
            base_url,
            plan.listings_per_page,
            &plan.selectors,
        );
        info!("Scraped {} jobs from page {page}", page_listings.len());

        if page_listings.is_empty() && page > 1 {
            stop_reason = classify_stop(snapshot.status, &snapshot.html);
            info!("No jobs found on page {page}, stopping: {stop_reason:?}");
            break;
        }

        previous_page = fingerprint(&snapshot.html, &plan.selectors);
        listings.extend(page_listings);
        pages_visited = page;

        if page < plan.max_pages {
            match source.click(plan.selectors.next_control()).await {
                Ok(true) => debug!("Clicked next for page {}", page + 1),
                Ok(false) => {
                    info!("No next control on page {page}, assuming end of results");
                    stop_reason = StopReason::EndOfResults;
                    break;
                }
                Err(e) => {
                    stop_reason = stop_for_error("clicking next", &e);
                    break;
                }
            }
        }
    }

    info!(
        "Extraction finished: {} jobs over {pages_visited} pages ({stop_reason:?})",
        listings.len()
    );
    if listings.is_empty() {
        warn!("No jobs were scraped at all. Check selectors and page content.");
    }

    Ok(ExtractionOutcome {
        listings,
        page_title,
        pages_visited,
        stop_reason,
    })
}

/// Polls until listing cards are present. Returns the last snapshot and
/// whether cards were found before the selector wait ran out.
async fn wait_for_listings(
    source: &mut dyn ListingSource,
    plan: &ExtractionPlan,
) -> Result<(PageSnapshot, bool), SourceError> {
    let mut backoff = plan.selector_wait.start();
    loop {
        let snapshot = source.snapshot().await?;
        if count_listings(&snapshot.html, &plan.selectors) > 0 {
            return Ok((snapshot, true));
        }
        if !backoff.wait().await {
            return Ok((snapshot, false));
        }
    }
}

/// Polls until the page shows a result set different from `previous` that
/// stays the same across two consecutive polls.
///
/// Returns `false` only when the deadline passes with the old result set
/// still on screen. A page that changed but never settled (for example one
/// that emptied out) returns `true` and the listing wait decides what it holds.
async fn wait_for_settle(
    source: &mut dyn ListingSource,
    plan: &ExtractionPlan,
    previous: Option<&str>,
) -> Result<bool, SourceError> {
    let mut backoff = plan.settle_wait.start();
    let mut last_seen: Option<String> = None;
    loop {
        let snapshot = source.snapshot().await?;
        let current = fingerprint(&snapshot.html, &plan.selectors);
        if current.is_some() && current.as_deref() != previous && current == last_seen {
            debug!("Results settled");
            return Ok(true);
        }
        last_seen = current;
        if !backoff.wait().await {
            let changed = previous.is_none() || last_seen.as_deref() != previous;
            debug!(
                "Results did not settle within {:?} (changed: {changed})",
                plan.settle_wait.timeout
            );
            return Ok(changed);
        }
    }
}

fn stop_for_error(action: &str, error: &SourceError) -> StopReason {
    warn!("Stopping extraction while {action}: {error}");
    match error {
        SourceError::Timeout(_) => StopReason::TransientFailure(format!("{action}: {error}")),
        _ => StopReason::FatalFailure(format!("{action}: {error}")),
    }
}
