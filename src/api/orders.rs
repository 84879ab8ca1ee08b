use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::auth::{AppState, CurrentUser};
use crate::error::{AppError, Result};
use crate::models::{AuditEvent, Order, Profile, Role};
use crate::services::checkout::{self, CheckoutRequest};
use crate::services::orders;

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub ticket_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RenominationBody {
    pub storage_path: Option<String>,
}

/// Reserve a ticket and open a pending order for it
async fn create_order(
    State(state): State<AppState>,
    CurrentUser(buyer): CurrentUser,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = checkout::start_checkout(
        &state.pool,
        CheckoutRequest {
            buyer_id: buyer.id,
            ticket_id: body.ticket_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = load_order_for(&state, &user, id).await?;
    Ok(Json(order))
}

/// Audit trail for one order, oldest first
async fn get_order_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEvent>>> {
    let order = load_order_for(&state, &user, id).await?;

    let events = AuditEvent::list_by_order(&state.pool, order.id).await?;
    Ok(Json(events))
}

/// The seller reports the renominated ticket has been re-issued to the buyer
async fn upload_renomination(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RenominationBody>,
) -> Result<Json<Order>> {
    let order =
        orders::record_renomination(&state.pool, &state.notifier, id, user.id, body.storage_path)
            .await?;

    Ok(Json(order))
}

/// Orders are visible to their buyer, their seller, and admins.
async fn load_order_for(state: &AppState, user: &Profile, id: Uuid) -> Result<Order> {
    let order = Order::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.buyer_id != user.id && order.seller_id != user.id && user.role != Role::Admin {
        return Err(AppError::Forbidden(
            "You are not a party to this order".to_string(),
        ));
    }

    Ok(order)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/history", get(get_order_history))
        .route("/orders/:id/renomination", post(upload_renomination))
}
