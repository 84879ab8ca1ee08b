use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::auth::{AdminUser, AppState, CurrentUser};
use crate::error::Result;
use crate::models::Order;
use crate::services::orders::{self, DisputeResolution};

#[derive(Debug, Deserialize)]
pub struct OpenDisputeBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDisputeBody {
    pub resolution: DisputeResolution,
}

/// The buyer contests a paid order. The seller's credit is held until an
/// admin rules on it.
async fn open_dispute(
    State(state): State<AppState>,
    CurrentUser(buyer): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<OpenDisputeBody>,
) -> Result<Json<Order>> {
    let order =
        orders::open_dispute(&state.pool, &state.notifier, id, buyer.id, body.reason).await?;

    Ok(Json(order))
}

/// Admin ruling: refund the buyer or release in the seller's favor
async fn resolve_dispute(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveDisputeBody>,
) -> Result<Json<Order>> {
    let order =
        orders::resolve_dispute(&state.pool, &state.notifier, id, admin.id, body.resolution)
            .await?;

    Ok(Json(order))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/:id/dispute", post(open_dispute))
        .route("/orders/:id/resolve", post(resolve_dispute))
}
