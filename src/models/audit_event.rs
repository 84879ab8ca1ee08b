use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Append-only trail of everything that moved money or state. There is no
/// update or delete path, here or anywhere else in the crate.
///
/// Event types in use: ticket_published, checkout_started, order_paid,
/// payment_failed, dispute_opened, dispute_refunded, dispute_released,
/// payout_released, tier_upgraded, renomination_uploaded, fraud_suspicion,
/// transition_rejected, user_blocked, user_unblocked.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub event_type: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub event_type: String,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn new(event_type: &str) -> Self {
        Self {
            user_id: None,
            order_id: None,
            event_type: event_type.to_string(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl AuditEvent {
    pub async fn append(
        exec: impl PgExecutor<'_>,
        entry: AuditEntry,
    ) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO audit_events (user_id, order_id, event_type, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.order_id)
        .bind(&entry.event_type)
        .bind(&entry.metadata)
        .fetch_one(exec)
        .await?;

        Ok(event)
    }

    pub async fn list_by_order(pool: &PgPool, order_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM audit_events
            WHERE order_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM audit_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM audit_events
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}
