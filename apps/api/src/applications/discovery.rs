//! Search over listings the pipeline discovered but nobody has acted on yet.

use crate::ingest::models::IngestionStatus;
use crate::models::application::ApplicationRecord;

/// Splits a comma-separated query parameter, dropping blanks.
pub fn split_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

/// Pending-review rows whose title contains any role term and whose location
/// contains any location term. No location terms means any location.
/// Matching is case-insensitive; `roles` and `locations` must already be
/// lowercased (see `split_terms`).
pub fn search_discovered<'a>(
    records: &'a [ApplicationRecord],
    roles: &[String],
    locations: &[String],
) -> Vec<&'a ApplicationRecord> {
    let pending = IngestionStatus::PendingReview.as_str();
    records
        .iter()
        .filter(|r| r.status == pending)
        .filter(|r| {
            let title = r.job_title.to_lowercase();
            roles.iter().any(|role| title.contains(role.as_str()))
        })
        .filter(|r| {
            if locations.is_empty() {
                return true;
            }
            let location = r.location.to_lowercase();
            locations.iter().any(|l| location.contains(l.as_str()))
        })
        .collect()
}
