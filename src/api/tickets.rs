use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::auth::{AppState, CurrentUser};
use crate::error::{AppError, Result};
use crate::models::Ticket;
use crate::services::publishing::{self, PublishTicketRequest};

#[derive(Debug, Deserialize)]
pub struct PublishTicketBody {
    pub event_id: Uuid,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub sector: Option<String>,
    pub row_label: Option<String>,
    pub seat: Option<String>,
    #[serde(default)]
    pub is_nominated: bool,
    pub holder_rut: Option<String>,
    pub document_base64: String,
    pub storage_path: String,
}

/// Publish a ticket for resale
async fn publish_ticket(
    State(state): State<AppState>,
    CurrentUser(seller): CurrentUser,
    Json(body): Json<PublishTicketBody>,
) -> Result<(StatusCode, Json<Ticket>)> {
    let ticket = publishing::publish_ticket(
        &state.pool,
        &state.notifier,
        PublishTicketRequest {
            seller_id: seller.id,
            event_id: body.event_id,
            price: body.price,
            original_price: body.original_price,
            sector: body.sector,
            row_label: body.row_label,
            seat: body.seat,
            is_nominated: body.is_nominated,
            holder_rut: body.holder_rut,
            document_base64: body.document_base64,
            storage_path: body.storage_path,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Public listing view
async fn get_ticket(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Ticket>> {
    let ticket = Ticket::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    Ok(Json(ticket))
}

/// Take a listing off the market for good. Sold and locked tickets belong
/// to an order's history and cannot be removed.
async fn delete_ticket(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let ticket = Ticket::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    if ticket.seller_id != user.id {
        return Err(AppError::Forbidden(
            "Only the seller may remove this listing".to_string(),
        ));
    }

    if !Ticket::delete_listing(&state.pool, id, user.id).await? {
        return Err(AppError::Conflict(
            "Only active or paused listings can be removed".to_string(),
        ));
    }

    tracing::info!(ticket_id = %id, seller_id = %user.id, "Listing removed");

    Ok(StatusCode::NO_CONTENT)
}

/// Temporarily hide an active listing
async fn pause_ticket(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>> {
    toggle_listing(&state, &user.id, id, true).await
}

/// Put a paused listing back on the market
async fn resume_ticket(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>> {
    toggle_listing(&state, &user.id, id, false).await
}

async fn toggle_listing(
    state: &AppState,
    user_id: &Uuid,
    id: Uuid,
    pause: bool,
) -> Result<Json<Ticket>> {
    let ticket = Ticket::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    if ticket.seller_id != *user_id {
        return Err(AppError::Forbidden(
            "Only the seller may change this listing".to_string(),
        ));
    }

    let changed = if pause {
        Ticket::pause(&state.pool, id, *user_id).await?
    } else {
        Ticket::resume(&state.pool, id, *user_id).await?
    };

    if !changed {
        return Err(AppError::Conflict(
            "Listing is not in a state that allows this change".to_string(),
        ));
    }

    let ticket = Ticket::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    Ok(Json(ticket))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tickets", post(publish_ticket))
        .route("/tickets/:id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:id/pause", post(pause_ticket))
        .route("/tickets/:id/resume", post(resume_ticket))
}
