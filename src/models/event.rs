use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    /// Exact end time when the venue publishes one; payout scheduling falls
    /// back to an estimate otherwise.
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventData {
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Event {
    pub async fn create(pool: &PgPool, data: CreateEventData) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, venue, starts_at, ends_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.venue)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(event)
    }

    pub async fn list_upcoming(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE starts_at >= NOW()
            ORDER BY starts_at ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}
