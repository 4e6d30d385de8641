//! Axum route handler for the ingestion trigger.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::ingest::extractor::run_extraction;
use crate::ingest::identity::{bearer_token, resolve_actor};
use crate::ingest::models::{ExtractedListing, StopReason};
use crate::ingest::recorder::record_listings;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub jobs: Vec<ExtractedListing>,
    pub page_title: String,
    pub successful_inserts: usize,
    pub attempted_inserts: usize,
    pub skipped_duplicates: usize,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// ANY /api/v1/ingest/linkedin
///
/// One ingestion run: resolve the actor, extract every page, then record
/// each listing. Preflight `OPTIONS` never reaches this handler; the CORS
/// layer answers it.
pub async fn handle_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IngestResponse>, AppError> {
    tracing::info!("Scraping function invoked");

    let actor = resolve_actor(
        bearer_token(&headers),
        state.verifier.as_ref(),
        state.config.identity_policy,
    )
    .await?;

    let outcome = run_extraction(state.launcher.as_ref(), &state.config.extraction).await?;

    let summary = record_listings(
        state.store.as_ref(),
        actor.id,
        &outcome.listings,
        state.config.dedupe_source_urls,
    )
    .await;

    Ok(Json(IngestResponse {
        jobs: outcome.listings,
        page_title: outcome.page_title,
        successful_inserts: summary.successful,
        attempted_inserts: summary.attempted,
        skipped_duplicates: summary.skipped_duplicates,
        pages_visited: outcome.pages_visited,
        stop_reason: outcome.stop_reason,
    }))
}
