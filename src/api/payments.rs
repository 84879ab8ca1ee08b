use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::auth::{AppState, InternalAuth};
use crate::error::Result;
use crate::models::Order;
use crate::services::orders::{self, PaymentOutcome};

#[derive(Debug, Deserialize)]
pub struct PaymentConfirmBody {
    pub order_id: Uuid,
    pub provider_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentFailBody {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfirmResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// Provider webhook: payment settled. Retries are answered with 200 so the
/// provider stops re-delivering.
async fn confirm_payment(
    State(state): State<AppState>,
    _auth: InternalAuth,
    Json(body): Json<PaymentConfirmBody>,
) -> Result<Json<PaymentConfirmResponse>> {
    let outcome = orders::confirm_payment(
        &state.pool,
        &state.notifier,
        body.order_id,
        &body.provider_ref,
    )
    .await?;

    let response = match outcome {
        PaymentOutcome::Confirmed(order) => PaymentConfirmResponse {
            status: "confirmed",
            order: Some(order),
        },
        PaymentOutcome::AlreadyConfirmed => PaymentConfirmResponse {
            status: "already_confirmed",
            order: None,
        },
    };

    Ok(Json(response))
}

/// Provider webhook: payment failed or was abandoned. Frees the ticket so
/// other buyers can check out; a retry goes through a new checkout.
async fn fail_payment(
    State(state): State<AppState>,
    _auth: InternalAuth,
    Json(body): Json<PaymentFailBody>,
) -> Result<Json<Order>> {
    let order = orders::record_payment_failure(&state.pool, body.order_id).await?;
    Ok(Json(order))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/fail", post(fail_payment))
}
