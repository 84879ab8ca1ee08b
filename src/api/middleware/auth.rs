use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Profile, Role};
use crate::services::notifications::Notifier;

/// Identity lives outside this service: the gateway authenticates the
/// caller and forwards the account id in this header.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared secret presented by the external cron driving the internal
/// job endpoints.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub notifier: Notifier,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

/// The calling user's profile. Rejects requests with no forwarded
/// identity, an unknown account, or a blocked one.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let user_id = Uuid::parse_str(header).map_err(|_| AppError::Unauthorized)?;

        let profile = Profile::find_by_id(&state.pool, user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if profile.is_blocked {
            return Err(AppError::Forbidden("Account is blocked".to_string()));
        }

        Ok(CurrentUser(profile))
    }
}

/// Like `CurrentUser`, additionally requiring the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(profile) = CurrentUser::from_request_parts(parts, state).await?;

        if profile.role != Role::Admin {
            return Err(AppError::Forbidden("Admin role required".to_string()));
        }

        Ok(AdminUser(profile))
    }
}

/// Guard for the internal endpoints (job triggers, provisioning). The
/// token comparison is constant time.
pub struct InternalAuth;

#[async_trait]
impl FromRequestParts<AppState> for InternalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let expected = state.config.internal_job_token.expose_secret();
        ring::constant_time::verify_slices_are_equal(token.as_bytes(), expected.as_bytes())
            .map_err(|_| AppError::Unauthorized)?;

        Ok(InternalAuth)
    }
}
