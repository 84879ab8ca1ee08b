use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    AuditEntry, AuditEvent, Event, MovementStatus, Order, OrderStatus, PaymentState, Profile,
    Ticket, WalletMovement,
};
use crate::services::notifications::Notifier;
use crate::services::payouts;

#[derive(thiserror::Error, Debug)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Only the buyer may act on this order")]
    NotBuyer,

    #[error("Only the seller may act on this order")]
    NotSeller,

    #[error("Ticket is not nominated")]
    NotNominated,

    #[error("Ticket is not reserved for this order")]
    TicketNotLocked,

    #[error("Payment can no longer change; order is {status}")]
    PaymentNotPending { status: OrderStatus },

    #[error("Renomination is not open for this order")]
    RenominationClosed,
}

/// Outcome of a payment confirmation. Replayed webhooks land on
/// `AlreadyConfirmed` with no state written.
#[derive(Debug)]
pub enum PaymentOutcome {
    Confirmed(Order),
    AlreadyConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeResolution {
    Refund,
    Release,
}

#[derive(Debug)]
pub enum ReleaseOutcome {
    Released(Order),
    Skipped,
}

/// Records a refused state change in the audit trail and builds the
/// conflict the caller returns.
async fn reject_transition(
    pool: &PgPool,
    order: &Order,
    to: OrderStatus,
) -> Result<OrderFlowError, sqlx::Error> {
    AuditEvent::append(
        pool,
        AuditEntry::new("transition_rejected")
            .order(order.id)
            .metadata(json!({
                "from": order.status,
                "to": to,
                "payment_state": order.payment_state,
            })),
    )
    .await?;

    Ok(OrderFlowError::InvalidTransition {
        from: order.status,
        to,
    })
}

/// Both parties of an order, for post-commit notifications. Lookup
/// failures are logged and swallowed; notifications never fail a flow.
async fn load_parties(pool: &PgPool, order: &Order) -> Option<(Profile, Profile)> {
    let buyer = Profile::find_by_id(pool, order.buyer_id).await.ok().flatten();
    let seller = Profile::find_by_id(pool, order.seller_id).await.ok().flatten();
    match (buyer, seller) {
        (Some(buyer), Some(seller)) => Some((buyer, seller)),
        _ => {
            tracing::warn!(order_id = %order.id, "Skipped notifications: profile lookup failed");
            None
        }
    }
}

/// Applies a confirmed payment. Idempotent: the pending->paid update is
/// conditional, and the partial unique index on sale credits backstops the
/// ledger, so a replayed or concurrent confirmation can never credit the
/// seller twice.
///
/// In one transaction: the order becomes paid, the ticket becomes sold and
/// the seller's escrowed credit is written with its availability time.
#[tracing::instrument(skip(pool, notifier), fields(order_id = %order_id))]
pub async fn confirm_payment(
    pool: &PgPool,
    notifier: &Notifier,
    order_id: Uuid,
    provider_ref: &str,
) -> Result<PaymentOutcome, OrderFlowError> {
    let existing = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    let event = Event::find_by_id(pool, existing.event_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    let mut tx = pool.begin().await?;

    let order = match Order::mark_paid(&mut *tx, order_id, provider_ref).await? {
        Some(order) => order,
        None => {
            tx.rollback().await?;
            let current = Order::find_by_id(pool, order_id)
                .await?
                .ok_or(OrderFlowError::OrderNotFound)?;
            return match current.status {
                OrderStatus::Pending => {
                    Err(reject_transition(pool, &current, OrderStatus::Paid).await?)
                }
                _ => {
                    tracing::debug!(status = %current.status, "Replayed payment confirmation ignored");
                    Ok(PaymentOutcome::AlreadyConfirmed)
                }
            };
        }
    };

    if !Ticket::mark_sold(&mut *tx, order.ticket_id).await? {
        tx.rollback().await?;
        return Err(OrderFlowError::TicketNotLocked);
    }

    let available_from = payouts::available_from(&event, order.paid_at.unwrap_or_else(Utc::now));
    let credit = match WalletMovement::insert_sale_credit(
        &mut *tx,
        order.id,
        order.seller_id,
        order.amount - order.fee,
        available_from,
    )
    .await
    {
        Ok(credit) => credit,
        Err(sqlx::Error::Database(db))
            if db.constraint() == Some("wallet_movements_one_sale_credit") =>
        {
            tx.rollback().await?;
            tracing::debug!("Concurrent confirmation already credited this order");
            return Ok(PaymentOutcome::AlreadyConfirmed);
        }
        Err(e) => return Err(e.into()),
    };

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("order_paid")
            .user(order.buyer_id)
            .order(order.id)
            .metadata(json!({
                "provider_ref": provider_ref,
                "amount": order.amount,
                "fee": order.fee,
                "credited": credit.amount,
                "available_from": credit.available_from,
            })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        order_id = %order.id,
        credited = %credit.amount,
        available_from = %credit.available_from,
        "Payment confirmed"
    );

    if let Some((buyer, seller)) = load_parties(pool, &order).await {
        notifier.order_paid(&buyer, &seller, &order).await;
    }

    Ok(PaymentOutcome::Confirmed(order))
}

/// Registers a failed capture. The ticket goes back on sale and the order
/// becomes dead history; a buyer who wants the ticket checks out again.
/// Replays are no-ops.
#[tracing::instrument(skip(pool), fields(order_id = %order_id))]
pub async fn record_payment_failure(
    pool: &PgPool,
    order_id: Uuid,
) -> Result<Order, OrderFlowError> {
    let mut tx = pool.begin().await?;

    let order = match Order::mark_payment_failed(&mut *tx, order_id).await? {
        Some(order) => order,
        None => {
            tx.rollback().await?;
            let current = Order::find_by_id(pool, order_id)
                .await?
                .ok_or(OrderFlowError::OrderNotFound)?;
            if current.status == OrderStatus::Pending
                && current.payment_state == PaymentState::Failed
            {
                tracing::debug!("Replayed payment failure ignored");
                return Ok(current);
            }
            return Err(OrderFlowError::PaymentNotPending {
                status: current.status,
            });
        }
    };

    if !Ticket::release_lock(&mut *tx, order.ticket_id).await? {
        tracing::warn!(ticket_id = %order.ticket_id, "Ticket was not locked on payment failure");
    }

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("payment_failed")
            .user(order.buyer_id)
            .order(order.id)
            .metadata(json!({ "ticket_id": order.ticket_id })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(order_id = %order.id, "Payment failure recorded; ticket back on sale");

    Ok(order)
}

/// Buyer-raised dispute. Only a paid order can be disputed; the escrowed
/// credit is put on hold in the same transaction so the release batch
/// cannot pay it out while the claim is open.
#[tracing::instrument(skip(pool, notifier, reason), fields(order_id = %order_id))]
pub async fn open_dispute(
    pool: &PgPool,
    notifier: &Notifier,
    order_id: Uuid,
    buyer_id: Uuid,
    reason: Option<String>,
) -> Result<Order, OrderFlowError> {
    let order = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    if order.buyer_id != buyer_id {
        return Err(OrderFlowError::NotBuyer);
    }

    let mut tx = pool.begin().await?;

    let disputed = match Order::mark_disputed(&mut *tx, order_id).await? {
        Some(order) => order,
        None => {
            tx.rollback().await?;
            let current = Order::find_by_id(pool, order_id)
                .await?
                .ok_or(OrderFlowError::OrderNotFound)?;
            return Err(reject_transition(pool, &current, OrderStatus::Disputed).await?);
        }
    };

    if !WalletMovement::hold_sale_credit(&mut *tx, order_id).await? {
        tx.rollback().await?;
        tracing::error!(order_id = %order_id, "Paid order has no pending sale credit to hold");
        return Err(OrderFlowError::InvalidTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Disputed,
        });
    }

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("dispute_opened")
            .user(buyer_id)
            .order(order_id)
            .metadata(json!({ "reason": reason })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(order_id = %order_id, "Dispute opened; credit held");

    if let Some((buyer, seller)) = load_parties(pool, &disputed).await {
        notifier.dispute_opened(&buyer, &seller, &disputed).await;
    }

    Ok(disputed)
}

/// Admin resolution of an open dispute.
///
/// Refund: the order is refunded and the credit reverted. If the credit
/// had somehow already been released, a compensating chargeback debit is
/// written instead of editing history.
///
/// Release: the order completes and the credit goes back into the release
/// queue with its availability re-triggered from the resolution time.
#[tracing::instrument(skip(pool, notifier), fields(order_id = %order_id, resolution = ?resolution))]
pub async fn resolve_dispute(
    pool: &PgPool,
    notifier: &Notifier,
    order_id: Uuid,
    admin_id: Uuid,
    resolution: DisputeResolution,
) -> Result<Order, OrderFlowError> {
    let order = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    let event = Event::find_by_id(pool, order.event_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    match resolution {
        DisputeResolution::Refund => {
            let mut tx = pool.begin().await?;

            let refunded = match Order::mark_refunded(&mut *tx, order_id).await? {
                Some(order) => order,
                None => {
                    tx.rollback().await?;
                    let current = Order::find_by_id(pool, order_id)
                        .await?
                        .ok_or(OrderFlowError::OrderNotFound)?;
                    return Err(reject_transition(pool, &current, OrderStatus::Refunded).await?);
                }
            };

            let reverted = WalletMovement::revert_sale_credit(&mut *tx, order_id).await?;
            let mut charged_back = false;
            if !reverted {
                if let Some(credit) = WalletMovement::find_sale_credit(&mut *tx, order_id).await? {
                    if credit.status == MovementStatus::Released {
                        WalletMovement::insert_chargeback_debit(
                            &mut *tx,
                            order_id,
                            credit.user_id,
                            credit.amount,
                        )
                        .await?;
                        charged_back = true;
                    }
                }
            }

            AuditEvent::append(
                &mut *tx,
                AuditEntry::new("dispute_refunded")
                    .user(admin_id)
                    .order(order_id)
                    .metadata(json!({ "charged_back": charged_back })),
            )
            .await?;

            tx.commit().await?;

            tracing::info!(order_id = %order_id, charged_back, "Dispute resolved: refund");

            if let Some((buyer, seller)) = load_parties(pool, &refunded).await {
                notifier.dispute_resolved(&buyer, &seller, &refunded, true).await;
            }

            Ok(refunded)
        }
        DisputeResolution::Release => {
            let available_from = payouts::release_after_resolution(&event, Utc::now());

            let mut tx = pool.begin().await?;

            let completed =
                match Order::mark_completed(&mut *tx, order_id, OrderStatus::Disputed).await? {
                    Some(order) => order,
                    None => {
                        tx.rollback().await?;
                        let current = Order::find_by_id(pool, order_id)
                            .await?
                            .ok_or(OrderFlowError::OrderNotFound)?;
                        return Err(
                            reject_transition(pool, &current, OrderStatus::Completed).await?
                        );
                    }
                };

            if !WalletMovement::resume_sale_credit(&mut *tx, order_id, available_from).await? {
                tx.rollback().await?;
                tracing::error!(order_id = %order_id, "Disputed order has no held credit to resume");
                return Err(OrderFlowError::InvalidTransition {
                    from: OrderStatus::Disputed,
                    to: OrderStatus::Completed,
                });
            }

            AuditEvent::append(
                &mut *tx,
                AuditEntry::new("dispute_released")
                    .user(admin_id)
                    .order(order_id)
                    .metadata(json!({ "available_from": available_from })),
            )
            .await?;

            tx.commit().await?;

            tracing::info!(
                order_id = %order_id,
                available_from = %available_from,
                "Dispute resolved: release"
            );

            if let Some((buyer, seller)) = load_parties(pool, &completed).await {
                notifier.dispute_resolved(&buyer, &seller, &completed, false).await;
            }

            Ok(completed)
        }
    }
}

/// Releases one order's escrowed credit once its availability time has
/// passed, completing the order when it is still in the paid state. A
/// dispute that lands first flips the credit to held and this call skips
/// with nothing written.
#[tracing::instrument(skip(pool, notifier), fields(order_id = %order_id))]
pub async fn release_escrow(
    pool: &PgPool,
    notifier: &Notifier,
    order_id: Uuid,
) -> Result<ReleaseOutcome, OrderFlowError> {
    let order = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    let mut tx = pool.begin().await?;

    // None when the order already completed through a seller-favor
    // resolution; only the credit release remains in that case.
    let completed = Order::mark_completed(&mut *tx, order_id, OrderStatus::Paid).await?;

    if !WalletMovement::release_sale_credit(&mut *tx, order_id).await? {
        tx.rollback().await?;
        tracing::debug!(order_id = %order_id, "Release skipped: credit not pending or not yet available");
        return Ok(ReleaseOutcome::Skipped);
    }

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("payout_released")
            .user(order.seller_id)
            .order(order_id)
            .metadata(json!({ "completed_order": completed.is_some() })),
    )
    .await?;

    tx.commit().await?;

    let order = completed.unwrap_or(order);
    tracing::info!(order_id = %order.id, "Escrowed credit released");

    if let Ok(Some(credit)) = WalletMovement::find_sale_credit(pool, order_id).await {
        if let Ok(Some(seller)) = Profile::find_by_id(pool, order.seller_id).await {
            notifier.payout_released(&seller, &credit).await;
        }
    }

    Ok(ReleaseOutcome::Released(order))
}

/// Seller registers the renominated (re-printed) document for a sold
/// nominated ticket. One-shot: the timestamp is stamped once.
#[tracing::instrument(skip(pool, notifier, storage_path), fields(order_id = %order_id))]
pub async fn record_renomination(
    pool: &PgPool,
    notifier: &Notifier,
    order_id: Uuid,
    seller_id: Uuid,
    storage_path: Option<String>,
) -> Result<Order, OrderFlowError> {
    let order = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    if order.seller_id != seller_id {
        return Err(OrderFlowError::NotSeller);
    }

    let ticket = Ticket::find_by_id(pool, order.ticket_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    if !ticket.is_nominated {
        return Err(OrderFlowError::NotNominated);
    }

    if !Order::set_renominated(pool, order_id).await? {
        return Err(OrderFlowError::RenominationClosed);
    }

    AuditEvent::append(
        pool,
        AuditEntry::new("renomination_uploaded")
            .user(seller_id)
            .order(order_id)
            .metadata(json!({ "storage_path": storage_path })),
    )
    .await?;

    tracing::info!(order_id = %order_id, "Renomination registered");

    let updated = Order::find_by_id(pool, order_id)
        .await?
        .ok_or(OrderFlowError::OrderNotFound)?;

    if let Ok(Some(buyer)) = Profile::find_by_id(pool, updated.buyer_id).await {
        notifier.renomination_uploaded(&buyer, &updated).await;
    }

    Ok(updated)
}
