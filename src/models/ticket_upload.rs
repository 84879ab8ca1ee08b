use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// A validated source PDF. Rows are written once and never touched again;
/// the unique sha256 constraint makes re-publishing the same document
/// impossible even under concurrent attempts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketUpload {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub sha256: String,
    pub storage_path: String,
    pub validation_status: String,
    pub is_nominated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUploadData {
    pub seller_id: Uuid,
    pub sha256: String,
    pub storage_path: String,
    pub is_nominated: bool,
}

impl TicketUpload {
    /// Inserts the upload record. A duplicate document surfaces as the
    /// unique-constraint violation on `ticket_uploads_sha256_key`; the
    /// caller turns that into a fraud-suspicion conflict.
    pub async fn insert(
        exec: impl PgExecutor<'_>,
        data: CreateUploadData,
    ) -> Result<Self, sqlx::Error> {
        let upload = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO ticket_uploads (seller_id, sha256, storage_path, is_nominated)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.seller_id)
        .bind(&data.sha256)
        .bind(&data.storage_path)
        .bind(data.is_nominated)
        .fetch_one(exec)
        .await?;

        Ok(upload)
    }

    /// Looks up the first publication of a document, used to reference the
    /// existing upload when a duplicate is rejected.
    pub async fn find_by_sha256(pool: &PgPool, sha256: &str) -> Result<Option<Self>, sqlx::Error> {
        let upload = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM ticket_uploads WHERE sha256 = $1
            "#,
        )
        .bind(sha256)
        .fetch_optional(pool)
        .await?;

        Ok(upload)
    }
}
