use serde::{Deserialize, Serialize};

/// Sentinel for text fields the listing card did not carry.
pub const MISSING_TEXT: &str = "N/A";
/// Sentinel for a listing link that could not be resolved to an absolute URL.
pub const MISSING_URL: &str = "#";
/// Compensation is never present on search cards.
pub const COMPENSATION_NOT_SPECIFIED: &str = "Not specified";
pub const DESCRIPTION_PLACEHOLDER: &str = "Description placeholder - full scraping needed";
pub const LINKEDIN_PLATFORM: &str = "LinkedIn";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IngestionStatus {
    #[default]
    #[serde(rename = "scraped_pending_review")]
    PendingReview,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::PendingReview => "scraped_pending_review",
        }
    }
}

/// One job posting as read off a search results page.
///
/// Field names on the wire match the `applications` columns so the same
/// payload can be shown to callers and inserted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedListing {
    #[serde(rename = "job_title")]
    pub title: String,
    #[serde(rename = "company")]
    pub organization: String,
    pub location: String,
    #[serde(rename = "salary")]
    pub compensation: String,
    #[serde(rename = "job_url")]
    pub source_url: String,
    #[serde(rename = "platform")]
    pub source_platform: String,
    #[serde(rename = "status")]
    pub ingestion_status: IngestionStatus,
    #[serde(rename = "job_description")]
    pub description: String,
}

impl Default for ExtractedListing {
    fn default() -> Self {
        Self {
            title: MISSING_TEXT.to_string(),
            organization: MISSING_TEXT.to_string(),
            location: MISSING_TEXT.to_string(),
            compensation: COMPENSATION_NOT_SPECIFIED.to_string(),
            source_url: MISSING_URL.to_string(),
            source_platform: LINKEDIN_PLATFORM.to_string(),
            ingestion_status: IngestionStatus::PendingReview,
            description: DESCRIPTION_PLACEHOLDER.to_string(),
        }
    }
}

impl ExtractedListing {
    /// True when the listing carries a real link (not the `#` sentinel).
    pub fn has_source_url(&self) -> bool {
        self.source_url != MISSING_URL && !self.source_url.is_empty()
    }
}

/// Why an extraction run stopped paging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// Every page up to the configured ceiling was read.
    PageLimit,
    /// The source ran out of results.
    EndOfResults,
    /// The source refused or failed in a way a later run may not hit
    /// (rate limiting, anti-automation interstitials, 5xx).
    TransientFailure(String),
    /// The source failed in a way retrying will not fix.
    FatalFailure(String),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::TransientFailure(_) | StopReason::FatalFailure(_)
        )
    }
}
