use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{
    checkout::CheckoutError, orders::OrderFlowError, publishing::PublishError,
    tiers::TierSyncError,
};

/// Application-level error taxonomy.
///
/// Validation and Conflict are terminal for the caller (fix the input or
/// give up; retrying the same request cannot succeed). Fraud is rejected
/// and recorded for admin review. Database and Internal are transient from
/// the caller's point of view.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Fraud suspicion: {0}")]
    Fraud(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Fraud(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_debug,
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Database(e) => AppError::Database(e),
            CheckoutError::BuyerNotFound => AppError::NotFound("Buyer not found".to_string()),
            CheckoutError::BuyerBlocked => {
                AppError::Forbidden("Account is blocked from purchasing".to_string())
            }
            CheckoutError::SellerNotFound => AppError::NotFound("Seller not found".to_string()),
            CheckoutError::TicketNotFound => AppError::NotFound("Ticket not found".to_string()),
            CheckoutError::TicketUnavailable => {
                AppError::Conflict("Ticket is no longer available".to_string())
            }
            CheckoutError::OwnTicket => {
                AppError::Validation("Cannot purchase your own ticket".to_string())
            }
        }
    }
}

impl From<OrderFlowError> for AppError {
    fn from(err: OrderFlowError) -> Self {
        match err {
            OrderFlowError::Database(e) => AppError::Database(e),
            OrderFlowError::OrderNotFound => AppError::NotFound("Order not found".to_string()),
            OrderFlowError::InvalidTransition { from, to } => {
                AppError::Conflict(format!("Order cannot move from {} to {}", from, to))
            }
            OrderFlowError::NotBuyer => {
                AppError::Forbidden("Only the buyer may dispute this order".to_string())
            }
            OrderFlowError::NotSeller => {
                AppError::Forbidden("Only the seller may act on this order".to_string())
            }
            OrderFlowError::NotNominated => AppError::Validation(
                "Ticket is not nominated; no renomination is required".to_string(),
            ),
            OrderFlowError::TicketNotLocked => {
                AppError::Conflict("Ticket is not reserved for this order".to_string())
            }
            OrderFlowError::PaymentNotPending { status } => AppError::Conflict(format!(
                "Payment can no longer change; order is {}",
                status
            )),
            OrderFlowError::RenominationClosed => {
                AppError::Conflict("Renomination is not open for this order".to_string())
            }
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Database(e) => AppError::Database(e),
            PublishError::SellerNotFound => AppError::NotFound("Seller not found".to_string()),
            PublishError::SellerBlocked => {
                AppError::Forbidden("Account is blocked from selling".to_string())
            }
            PublishError::EventNotFound => AppError::NotFound("Event not found".to_string()),
            PublishError::InvalidPrice => {
                AppError::Validation("Price must be greater than zero".to_string())
            }
            PublishError::InvalidDocument(msg) => AppError::Validation(msg),
            PublishError::InvalidRut { rut } => {
                AppError::Fraud(format!("RUT failed checksum validation: {}", rut))
            }
            PublishError::DuplicateDocument { existing_upload_id } => AppError::Fraud(format!(
                "Document already published (upload {})",
                existing_upload_id
            )),
        }
    }
}

impl From<TierSyncError> for AppError {
    fn from(err: TierSyncError) -> Self {
        match err {
            TierSyncError::Database(e) => AppError::Database(e),
            TierSyncError::SellerNotFound => AppError::NotFound("Seller not found".to_string()),
        }
    }
}
