use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AuditEntry, AuditEvent, CreateOrderData, Order, Profile, Ticket};
use crate::services::fees;

#[derive(thiserror::Error, Debug)]
pub enum CheckoutError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Buyer not found")]
    BuyerNotFound,

    #[error("Buyer account is blocked")]
    BuyerBlocked,

    #[error("Seller not found")]
    SellerNotFound,

    #[error("Ticket not found")]
    TicketNotFound,

    #[error("Ticket is no longer available")]
    TicketUnavailable,

    #[error("Cannot purchase your own ticket")]
    OwnTicket,
}

pub struct CheckoutRequest {
    pub buyer_id: Uuid,
    pub ticket_id: Uuid,
}

/// Starts a purchase: reserves the ticket and opens a pending order with
/// the commission snapshotted from the seller's current role.
///
/// The reservation is a conditional active->locked update, so of two buyers
/// racing for the same ticket exactly one gets an order; the loser sees
/// `TicketUnavailable` with nothing written. The partial unique index on
/// live orders per ticket backstops the same guarantee at the storage
/// layer.
#[tracing::instrument(skip(pool, request), fields(buyer_id = %request.buyer_id, ticket_id = %request.ticket_id))]
pub async fn start_checkout(
    pool: &PgPool,
    request: CheckoutRequest,
) -> Result<Order, CheckoutError> {
    // 1. Load and validate buyer
    let buyer = Profile::find_by_id(pool, request.buyer_id)
        .await?
        .ok_or(CheckoutError::BuyerNotFound)?;

    if buyer.is_blocked {
        return Err(CheckoutError::BuyerBlocked);
    }

    // 2. The listing must exist and belong to someone else
    let listing = Ticket::find_by_id(pool, request.ticket_id)
        .await?
        .ok_or(CheckoutError::TicketNotFound)?;

    if listing.seller_id == buyer.id {
        return Err(CheckoutError::OwnTicket);
    }

    // 3. Seller role fixes the commission for this order
    let seller = Profile::find_by_id(pool, listing.seller_id)
        .await?
        .ok_or(CheckoutError::SellerNotFound)?;

    // 4. Reserve the ticket and open the order atomically
    let mut tx = pool.begin().await?;

    let reserved = Ticket::reserve(&mut *tx, request.ticket_id)
        .await?
        .ok_or(CheckoutError::TicketUnavailable)?;

    let fee = fees::seller_fee(reserved.price, seller.role);
    let order = Order::create_pending(
        &mut *tx,
        CreateOrderData {
            buyer_id: buyer.id,
            seller_id: reserved.seller_id,
            ticket_id: reserved.id,
            event_id: reserved.event_id,
            amount: reserved.price,
            fee,
            total_paid: reserved.price + fee,
        },
    )
    .await?;

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("checkout_started")
            .user(buyer.id)
            .order(order.id)
            .metadata(json!({
                "ticket_id": reserved.id,
                "amount": order.amount,
                "fee": order.fee,
                "seller_role": seller.role,
            })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(order_id = %order.id, total = %order.total_paid, "Checkout started");

    Ok(order)
}
