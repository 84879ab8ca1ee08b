use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Paused,
    Sold,
    Locked,
    Processing,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seller_id: Uuid,
    pub ticket_upload_id: Uuid,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub status: TicketStatus,
    pub sector: Option<String>,
    pub row_label: Option<String>,
    pub seat: Option<String>,
    pub is_nominated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTicketData {
    pub event_id: Uuid,
    pub seller_id: Uuid,
    pub ticket_upload_id: Uuid,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub sector: Option<String>,
    pub row_label: Option<String>,
    pub seat: Option<String>,
    pub is_nominated: bool,
}

impl Ticket {
    pub async fn create(
        exec: impl PgExecutor<'_>,
        data: CreateTicketData,
    ) -> Result<Self, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO tickets (
                event_id, seller_id, ticket_upload_id, price, original_price,
                sector, row_label, seat, is_nominated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.seller_id)
        .bind(data.ticket_upload_id)
        .bind(data.price)
        .bind(data.original_price)
        .bind(&data.sector)
        .bind(&data.row_label)
        .bind(&data.seat)
        .bind(data.is_nominated)
        .fetch_one(exec)
        .await?;

        Ok(ticket)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tickets WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(ticket)
    }

    pub async fn list_active_by_event(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let tickets = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM tickets
            WHERE event_id = $1 AND status = 'active'
            ORDER BY price ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await?;

        Ok(tickets)
    }

    /// Reserves the ticket for a checkout. The conditional update is the
    /// concurrency guard: of two buyers racing for the same ticket, exactly
    /// one sees a row come back.
    pub async fn reserve(
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let ticket = sqlx::query_as::<_, Self>(
            r#"
            UPDATE tickets
            SET status = 'locked', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        Ok(ticket)
    }

    /// Finalizes the sale of a reserved ticket. Returns false when the
    /// ticket was not in the locked state (e.g. a replayed confirmation
    /// after the sale already went through).
    pub async fn mark_sold(exec: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'sold', updated_at = NOW()
            WHERE id = $1 AND status = 'locked'
            "#,
        )
        .bind(id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Puts a reserved ticket back on sale after a failed capture.
    pub async fn release_lock(exec: impl PgExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'active', updated_at = NOW()
            WHERE id = $1 AND status = 'locked'
            "#,
        )
        .bind(id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Seller-side listing toggle: active -> paused.
    pub async fn pause(pool: &PgPool, id: Uuid, seller_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'paused', updated_at = NOW()
            WHERE id = $1 AND seller_id = $2 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Seller-side listing toggle: paused -> active.
    pub async fn resume(pool: &PgPool, id: Uuid, seller_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'active', updated_at = NOW()
            WHERE id = $1 AND seller_id = $2 AND status = 'paused'
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes a listing. Only the owner may delete, and only while the
    /// ticket is still active or paused; sold and locked tickets are part
    /// of an order's history and must stay.
    pub async fn delete_listing(
        pool: &PgPool,
        id: Uuid,
        seller_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM tickets
            WHERE id = $1 AND seller_id = $2 AND status IN ('active', 'paused')
            "#,
        )
        .bind(id)
        .bind(seller_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
