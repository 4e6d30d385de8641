//! Bulk Recorder — one independent insert per extracted listing.
//!
//! Sequential, no batching, no retry. A failed insert is logged and the loop
//! moves on, so one bad row never aborts the rest of the run.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::applications::store::ApplicationStore;
use crate::ingest::models::ExtractedListing;
use crate::models::application::NewApplication;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    /// Inserts issued. Never more than the listings handed in.
    pub attempted: usize,
    /// Inserts that succeeded. Never more than `attempted`.
    pub successful: usize,
    /// Listings skipped because their URL already appeared earlier in the run.
    pub skipped_duplicates: usize,
}

pub async fn record_listings(
    store: &dyn ApplicationStore,
    actor: Uuid,
    listings: &[ExtractedListing],
    dedupe_source_urls: bool,
) -> RecordSummary {
    let mut summary = RecordSummary::default();
    if listings.is_empty() {
        return summary;
    }

    info!(
        "Inserting {} scraped jobs for user {actor}",
        listings.len()
    );
    let mut seen_urls: HashSet<&str> = HashSet::new();

    for listing in listings {
        if dedupe_source_urls
            && listing.has_source_url()
            && !seen_urls.insert(listing.source_url.as_str())
        {
            summary.skipped_duplicates += 1;
            continue;
        }

        summary.attempted += 1;
        match store
            .insert(&NewApplication::from_listing(actor, listing))
            .await
        {
            Ok(_) => summary.successful += 1,
            Err(e) => error!(
                "Error inserting job '{}' ({}): {e}",
                listing.title, listing.source_url
            ),
        }
    }

    info!(
        "Successfully processed {} insert operations out of {} attempted ({} duplicates skipped)",
        summary.successful, summary.attempted, summary.skipped_duplicates
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing, MemoryStore};

    fn listings(n: usize) -> Vec<ExtractedListing> {
        (0..n).map(listing).collect()
    }

    #[tokio::test]
    async fn test_every_third_insert_failing_yields_seven_of_ten() {
        let store = MemoryStore::failing_every(3);
        let actor = Uuid::new_v4();

        let summary = record_listings(&store, actor, &listings(10), true).await;

        assert_eq!(summary.attempted, 10);
        assert_eq!(summary.successful, 7);
        assert_eq!(store.rows().len(), 7);
        assert!(store.rows().iter().all(|r| r.user_id == actor));
    }

    #[tokio::test]
    async fn test_successful_never_exceeds_listings() {
        for fail_every in [0, 1, 2, 5] {
            let store = MemoryStore::failing_every(fail_every);
            let input = listings(12);
            let summary = record_listings(&store, Uuid::new_v4(), &input, false).await;
            assert!(summary.successful <= summary.attempted);
            assert!(summary.attempted <= input.len());
        }
    }

    #[tokio::test]
    async fn test_in_run_duplicates_skipped_when_enabled() {
        let store = MemoryStore::default();
        let mut input = listings(3);
        input.push(listing(1));
        // sentinel URLs never count as duplicates
        input.push(ExtractedListing::default());
        input.push(ExtractedListing::default());

        let summary = record_listings(&store, Uuid::new_v4(), &input, true).await;

        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.successful, 5);
    }

    #[tokio::test]
    async fn test_duplicates_inserted_when_dedupe_disabled() {
        let store = MemoryStore::default();
        let input = vec![listing(1), listing(1)];

        let summary = record_listings(&store, Uuid::new_v4(), &input, false).await;

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.skipped_duplicates, 0);
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_inserts() {
        let store = MemoryStore::default();
        let summary = record_listings(&store, Uuid::new_v4(), &[], true).await;
        assert_eq!(summary, RecordSummary::default());
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_rows_carry_pending_review_status() {
        let store = MemoryStore::default();
        record_listings(&store, Uuid::new_v4(), &listings(1), true).await;
        assert_eq!(store.rows()[0].status, "scraped_pending_review");
    }
}
