use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Sale,
    Chargeback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Pending,
    Held,
    Released,
    Reverted,
}

/// One escrow ledger entry. Amount, direction, kind and parties never change
/// after insert; only `status` and `available_from` advance, and only through
/// the conditional updates below. Corrections are compensating entries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletMovement {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub direction: MovementDirection,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub status: MovementStatus,
    pub available_from: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl WalletMovement {
    /// Writes the seller's escrowed credit for a confirmed sale. The partial
    /// unique index on (order_id) for sale credits makes a webhook replay
    /// fail here rather than credit the seller twice.
    pub async fn insert_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        available_from: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        let movement = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO wallet_movements (order_id, user_id, direction, kind, amount, available_from)
            VALUES ($1, $2, 'credit', 'sale', $3, $4)
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(amount)
        .bind(available_from)
        .fetch_one(exec)
        .await?;

        Ok(movement)
    }

    /// Compensating debit for a refund granted after the sale credit was
    /// already released. Applies immediately against future payouts.
    pub async fn insert_chargeback_debit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Self, sqlx::Error> {
        let movement = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO wallet_movements (order_id, user_id, direction, kind, amount, status, available_from)
            VALUES ($1, $2, 'debit', 'chargeback', $3, 'released', NOW())
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(amount)
        .fetch_one(exec)
        .await?;

        Ok(movement)
    }

    pub async fn find_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let movement = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM wallet_movements
            WHERE order_id = $1 AND direction = 'credit' AND kind = 'sale'
            "#,
        )
        .bind(order_id)
        .fetch_optional(exec)
        .await?;

        Ok(movement)
    }

    /// pending -> held. Suspends release while a dispute is open.
    pub async fn hold_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_movements
            SET status = 'held'
            WHERE order_id = $1 AND direction = 'credit' AND kind = 'sale'
              AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// held -> pending, with availability re-triggered from the dispute
    /// resolution.
    pub async fn resume_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
        available_from: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_movements
            SET status = 'pending', available_from = $2
            WHERE order_id = $1 AND direction = 'credit' AND kind = 'sale'
              AND status = 'held'
            "#,
        )
        .bind(order_id)
        .bind(available_from)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// {pending, held} -> reverted. Used when a refund lands before the
    /// credit left escrow.
    pub async fn revert_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_movements
            SET status = 'reverted'
            WHERE order_id = $1 AND direction = 'credit' AND kind = 'sale'
              AND status IN ('pending', 'held')
            "#,
        )
        .bind(order_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// pending -> released, only once the availability time has passed. A
    /// concurrently opened dispute flips the row to held first and makes
    /// this match zero rows.
    pub async fn release_sale_credit(
        exec: impl PgExecutor<'_>,
        order_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_movements
            SET status = 'released'
            WHERE order_id = $1 AND direction = 'credit' AND kind = 'sale'
              AND status = 'pending' AND available_from <= NOW()
            "#,
        )
        .bind(order_id)
        .execute(exec)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sale credits past their availability time, oldest first. Includes
    /// credits resumed after a seller-favor resolution, whose orders are
    /// already completed.
    pub async fn find_release_ready(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let movements = sqlx::query_as::<_, Self>(
            r#"
            SELECT m.* FROM wallet_movements m
            JOIN orders o ON o.id = m.order_id
            WHERE m.direction = 'credit' AND m.kind = 'sale'
              AND m.status = 'pending'
              AND m.available_from <= NOW()
              AND o.status IN ('paid', 'completed')
            ORDER BY m.available_from ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(movements)
    }
}
