use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Instant;
use url::Url;

use crate::api::middleware::auth::AppState;
use crate::services::notifications::EmailClient;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub database: ServiceHealth,
    pub email_api: ServiceHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    pub response_time_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check endpoint
/// Returns 200 if all dependencies are healthy, 503 if any are down
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = Instant::now();

    let db_health = check_database(&state.pool).await;

    let email_health = if let (Some(api_url), Some(api_key)) =
        (&state.config.email_api_url, &state.config.email_api_key)
    {
        check_email_api(api_url, api_key.clone()).await
    } else {
        ServiceHealth {
            status: "not_configured".to_string(),
            response_time_ms: 0,
            error: Some("Email API credentials not configured".to_string()),
        }
    };

    let all_healthy = db_health.status == "healthy"
        && (email_health.status == "healthy" || email_health.status == "not_configured");

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies: DependencyStatus {
            database: db_health,
            email_api: email_health,
        },
    };

    tracing::info!(
        status = %response.status,
        duration_ms = start.elapsed().as_millis(),
        "Health check completed"
    );

    (status_code, Json(response))
}

/// Check database connectivity
async fn check_database(pool: &PgPool) -> ServiceHealth {
    let start = Instant::now();

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => ServiceHealth {
            status: "healthy".to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: None,
        },
        Err(e) => ServiceHealth {
            status: "unhealthy".to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: Some(format!("Database error: {}", e)),
        },
    }
}

/// Check email API availability
async fn check_email_api(api_url: &str, api_key: secrecy::Secret<String>) -> ServiceHealth {
    let start = Instant::now();

    let result = match Url::parse(api_url) {
        Ok(base_url) => EmailClient::new(base_url, api_key).probe().await,
        Err(e) => {
            return ServiceHealth {
                status: "unhealthy".to_string(),
                response_time_ms: start.elapsed().as_millis(),
                error: Some(format!("Invalid email API URL: {}", e)),
            }
        }
    };

    match result {
        Ok(_) => ServiceHealth {
            status: "healthy".to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: None,
        },
        Err(e) => ServiceHealth {
            status: "unhealthy".to_string(),
            response_time_ms: start.elapsed().as_millis(),
            error: Some(format!("Email API error: {}", e)),
        },
    }
}
