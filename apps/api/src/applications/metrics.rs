use chrono::NaiveDate;
use serde::Serialize;

use crate::models::application::{ApplicationRecord, STATUS_INTERVIEW, STATUS_REJECTED};

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_applications: usize,
    pub applied_today: usize,
    pub interviews: usize,
    pub rejections: usize,
}

/// `today` is a UTC calendar date; a row counts as applied today when its
/// `application_date` falls on it.
pub fn compute_metrics(records: &[ApplicationRecord], today: NaiveDate) -> DashboardMetrics {
    records
        .iter()
        .fold(DashboardMetrics::default(), |mut metrics, record| {
            metrics.total_applications += 1;
            if record.application_date.date_naive() == today {
                metrics.applied_today += 1;
            }
            match record.status.as_str() {
                STATUS_INTERVIEW => metrics.interviews += 1,
                STATUS_REJECTED => metrics.rejections += 1,
                _ => {}
            }
            metrics
        })
}
