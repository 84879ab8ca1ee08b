use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Disputed,
    Refunded,
    Completed,
}

impl OrderStatus {
    /// Canonical transition matrix. The conditional updates below enforce
    /// the same table row-atomically; a mismatch between the two is a bug.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Paid)
                | (Paid, Disputed)
                | (Paid, Completed)
                | (Disputed, Refunded)
                | (Disputed, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Refunded | OrderStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Disputed => "disputed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Initiated,
    Authorized,
    Paid,
    Failed,
}

impl PaymentState {
    /// Payment states only move forward. Failed is terminal for the order:
    /// a retry goes through a fresh checkout, never by resurrecting the
    /// failed one (its ticket may already be reserved by another buyer).
    pub fn can_advance(self, to: PaymentState) -> bool {
        use PaymentState::*;
        matches!(
            (self, to),
            (Initiated, Authorized)
                | (Initiated, Paid)
                | (Authorized, Paid)
                | (Initiated, Failed)
                | (Authorized, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub status: OrderStatus,
    pub payment_state: PaymentState,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total_paid: Decimal,
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub renominated_uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateOrderData {
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub amount: Decimal,
    pub fee: Decimal,
    pub total_paid: Decimal,
}

impl Order {
    pub async fn create_pending(
        exec: impl PgExecutor<'_>,
        data: CreateOrderData,
    ) -> Result<Self, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO orders (buyer_id, seller_id, ticket_id, event_id, amount, fee, total_paid)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(data.buyer_id)
        .bind(data.seller_id)
        .bind(data.ticket_id)
        .bind(data.event_id)
        .bind(data.amount)
        .bind(data.fee)
        .bind(data.total_paid)
        .fetch_one(exec)
        .await?;

        Ok(order)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(order)
    }

    /// pending -> paid. Conditional on the current status so a replayed
    /// confirmation matches zero rows instead of double-applying. An order
    /// whose payment already failed can no longer be paid; its ticket may
    /// be reserved by someone else by then.
    pub async fn mark_paid(
        exec: impl PgExecutor<'_>,
        id: Uuid,
        provider_ref: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            UPDATE orders
            SET status = 'paid', payment_state = 'paid', paid_at = NOW(), provider_ref = $2
            WHERE id = $1 AND status = 'pending' AND payment_state <> 'failed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_ref)
        .fetch_optional(exec)
        .await?;

        Ok(order)
    }

    /// Records a failed capture attempt. The order keeps its row for the
    /// audit trail but drops out of the live-order index, freeing the
    /// ticket slot; only a not-yet-paid payment can fail.
    pub async fn mark_payment_failed(
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            UPDATE orders
            SET payment_state = 'failed'
            WHERE id = $1 AND status = 'pending' AND payment_state IN ('initiated', 'authorized')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        Ok(order)
    }

    /// paid -> disputed.
    pub async fn mark_disputed(
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            UPDATE orders
            SET status = 'disputed'
            WHERE id = $1 AND status = 'paid'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        Ok(order)
    }

    /// disputed -> refunded.
    pub async fn mark_refunded(
        exec: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            UPDATE orders
            SET status = 'refunded'
            WHERE id = $1 AND status = 'disputed'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(exec)
        .await?;

        Ok(order)
    }

    /// {paid, disputed} -> completed. The caller states which transition it
    /// is performing; a mismatch matches zero rows.
    pub async fn mark_completed(
        exec: impl PgExecutor<'_>,
        id: Uuid,
        from: OrderStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let order = sqlx::query_as::<_, Self>(
            r#"
            UPDATE orders
            SET status = 'completed'
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .fetch_optional(exec)
        .await?;

        Ok(order)
    }

    /// Stamps the renomination upload once; repeat calls match zero rows.
    pub async fn set_renominated(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET renominated_uploaded_at = NOW()
            WHERE id = $1
              AND status IN ('paid', 'disputed', 'completed')
              AND renominated_uploaded_at IS NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Historical paid-sale count driving the tier ladder. Disputed orders
    /// do not count until resolved in the seller's favor.
    pub async fn count_paid_sales(pool: &PgPool, seller_id: Uuid) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE seller_id = $1 AND status IN ('paid', 'completed')
            "#,
        )
        .bind(seller_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Sellers with a sale confirmed since the given instant, for the tier
    /// refresh batch.
    pub async fn sellers_with_sales_since(
        pool: &PgPool,
        since: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT seller_id FROM orders
            WHERE paid_at >= $1 AND status IN ('paid', 'completed')
            "#,
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition(Paid));
        assert!(Paid.can_transition(Disputed));
        assert!(Paid.can_transition(Completed));
        assert!(Disputed.can_transition(Refunded));
        assert!(Disputed.can_transition(Completed));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use OrderStatus::*;
        for to in [Pending, Paid, Disputed, Refunded, Completed] {
            assert!(!Completed.can_transition(to), "completed -> {to} must be rejected");
            assert!(!Refunded.can_transition(to), "refunded -> {to} must be rejected");
        }
    }

    #[test]
    fn test_no_backwards_or_skipping_transitions() {
        use OrderStatus::*;
        assert!(!Completed.can_transition(Pending));
        assert!(!Paid.can_transition(Pending));
        assert!(!Pending.can_transition(Completed));
        assert!(!Pending.can_transition(Disputed));
        assert!(!Pending.can_transition(Refunded));
        assert!(!Disputed.can_transition(Paid));
        assert!(!Refunded.can_transition(Completed));
    }

    #[test]
    fn test_self_transitions_rejected() {
        use OrderStatus::*;
        for s in [Pending, Paid, Disputed, Refunded, Completed] {
            assert!(!s.can_transition(s));
        }
    }

    #[test]
    fn test_payment_states_move_forward() {
        use PaymentState::*;
        assert!(Initiated.can_advance(Authorized));
        assert!(Authorized.can_advance(Paid));
        assert!(Initiated.can_advance(Paid));
        assert!(!Paid.can_advance(Initiated));
        assert!(!Paid.can_advance(Failed));
    }

    #[test]
    fn test_payment_failure_is_terminal() {
        use PaymentState::*;
        assert!(Initiated.can_advance(Failed));
        assert!(Authorized.can_advance(Failed));
        assert!(!Failed.can_advance(Initiated));
        assert!(!Failed.can_advance(Paid));
        assert!(!Failed.can_advance(Authorized));
    }
}
