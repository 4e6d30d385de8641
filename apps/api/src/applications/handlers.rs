//! Axum route handlers for the Applications API.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::applications::discovery::{search_discovered, split_terms};
use crate::applications::metrics::{compute_metrics, DashboardMetrics};
use crate::errors::AppError;
use crate::ingest::identity::{bearer_token, resolve_actor, ResolvedActor};
use crate::models::application::{ApplicationRecord, NewApplication, STATUS_APPLIED};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub job_description: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub platform: Option<String>,
    pub job_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub application: ApplicationRecord,
}

#[derive(Debug, Deserialize)]
pub struct JobSearchQuery {
    pub roles: Option<String>,
    pub locations: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobSearchResponse {
    pub jobs: Vec<ApplicationRecord>,
}

async fn actor_for(state: &AppState, headers: &HeaderMap) -> Result<ResolvedActor, AppError> {
    resolve_actor(
        bearer_token(headers),
        state.verifier.as_ref(),
        state.config.identity_policy,
    )
    .await
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/applications
///
/// Records an application the user made themselves. Status is always "Applied".
pub async fn handle_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ApplyRequest>, JsonRejection>,
) -> Result<Json<ApplyResponse>, AppError> {
    let Json(request) = payload?;
    let (Some(job_title), Some(company)) =
        (required(request.job_title), required(request.company))
    else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };

    let actor = actor_for(&state, &headers).await?;

    let application = state
        .store
        .insert(&NewApplication {
            user_id: actor.id,
            job_title,
            company,
            job_url: request.job_url.unwrap_or_default(),
            status: STATUS_APPLIED.to_string(),
            platform: request.platform.unwrap_or_default(),
            job_description: request.job_description.unwrap_or_default(),
            location: request.location.unwrap_or_default(),
            salary: request.salary.unwrap_or_default(),
        })
        .await?;

    tracing::info!(
        "Recorded application {} for user {}",
        application.id,
        actor.id
    );

    Ok(Json(ApplyResponse {
        success: true,
        application,
    }))
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApplicationRecord>>, AppError> {
    let actor = actor_for(&state, &headers).await?;
    let applications = state.store.list_for_user(actor.id).await?;
    Ok(Json(applications))
}

/// GET /api/v1/applications/metrics
pub async fn handle_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DashboardMetrics>, AppError> {
    let actor = actor_for(&state, &headers).await?;
    let applications = state.store.list_for_user(actor.id).await?;
    Ok(Json(compute_metrics(
        &applications,
        Utc::now().date_naive(),
    )))
}

/// GET /api/v1/jobs?roles=a,b&locations=x,y
///
/// Discovered listings still waiting for review, filtered by role and location.
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<JobSearchQuery>,
) -> Result<Json<JobSearchResponse>, AppError> {
    let roles = split_terms(query.roles.as_deref());
    if roles.is_empty() {
        return Err(AppError::Validation(
            "Roles parameter is required".to_string(),
        ));
    }
    let locations = split_terms(query.locations.as_deref());

    let actor = actor_for(&state, &headers).await?;
    let applications = state.store.list_for_user(actor.id).await?;
    let jobs = search_discovered(&applications, &roles, &locations)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(JobSearchResponse { jobs }))
}
