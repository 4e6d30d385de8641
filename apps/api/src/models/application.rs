use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::ingest::models::ExtractedListing;

/// Status given to applications recorded by hand rather than scraped.
pub const STATUS_APPLIED: &str = "Applied";
pub const STATUS_INTERVIEW: &str = "Interview";
pub const STATUS_REJECTED: &str = "Rejected";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_title: String,
    pub company: String,
    pub job_url: String,
    /// Mutable pipeline status; starts as the listing's ingestion status.
    pub status: String,
    pub platform: String,
    pub job_description: String,
    pub location: String,
    pub salary: String,
    pub application_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the `applications` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub user_id: Uuid,
    pub job_title: String,
    pub company: String,
    pub job_url: String,
    pub status: String,
    pub platform: String,
    pub job_description: String,
    pub location: String,
    pub salary: String,
}

impl NewApplication {
    pub fn from_listing(user_id: Uuid, listing: &ExtractedListing) -> Self {
        Self {
            user_id,
            job_title: listing.title.clone(),
            company: listing.organization.clone(),
            job_url: listing.source_url.clone(),
            status: listing.ingestion_status.as_str().to_string(),
            platform: listing.source_platform.clone(),
            job_description: listing.description.clone(),
            location: listing.location.clone(),
            salary: listing.compensation.clone(),
        }
    }
}
