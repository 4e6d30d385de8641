use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::application::{ApplicationRecord, NewApplication};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for application rows. Carried in `AppState` as
/// `Arc<dyn ApplicationStore>` so the ingestion loop can be driven against
/// an in-memory store in tests.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts one row. Each call is independent; there is no batching.
    async fn insert(&self, application: &NewApplication) -> Result<ApplicationRecord, StoreError>;

    /// All rows owned by `user_id`, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApplicationRecord>, StoreError>;
}

pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn insert(&self, application: &NewApplication) -> Result<ApplicationRecord, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            INSERT INTO applications
                (user_id, job_title, company, job_url, status,
                 platform, job_description, location, salary)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(application.user_id)
        .bind(&application.job_title)
        .bind(&application.company)
        .bind(&application.job_url)
        .bind(&application.status)
        .bind(&application.platform)
        .bind(&application.job_description)
        .bind(&application.location)
        .bind(&application.salary)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(sqlx::query_as::<_, ApplicationRecord>(
            "SELECT * FROM applications WHERE user_id = $1 ORDER BY application_date DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
