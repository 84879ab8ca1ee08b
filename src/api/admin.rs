use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::auth::{AdminUser, AppState, InternalAuth};
use crate::error::{AppError, Result};
use crate::jobs::payout_release::{self, PayoutReleaseStats};
use crate::jobs::tier_refresh::{self, TierRefreshStats};
use crate::models::{AuditEntry, AuditEvent, CreateProfileData, Profile, Role};

#[derive(Debug, Deserialize)]
pub struct PayoutReleaseParams {
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl Default for PayoutReleaseParams {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> i64 {
    200
}

#[derive(Debug, Deserialize)]
pub struct TierRefreshParams {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

impl Default for TierRefreshParams {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
        }
    }
}

fn default_lookback_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct AuditListParams {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_audit_limit() -> i64 {
    100
}

/// Provisioning payload from the identity service. The role arrives as a
/// free-form string (legacy accounts carry values like "ultra premium");
/// anything unrecognized lands on the basic bracket.
#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub display_name: String,
    pub email: String,
    pub rut: Option<String>,
    pub role: Option<String>,
}

/// Cron entrypoint: release escrowed credits whose hold has elapsed
async fn run_payout_release(
    State(state): State<AppState>,
    _auth: InternalAuth,
    params: Option<Json<PayoutReleaseParams>>,
) -> Result<Json<PayoutReleaseStats>> {
    let params = params.map(|Json(p)| p).unwrap_or_default();

    let stats =
        payout_release::release_due_payouts(&state.pool, &state.notifier, params.batch_size)
            .await?;

    Ok(Json(stats))
}

/// Cron entrypoint: recompute tiers for sellers with recent sales
async fn run_tier_refresh(
    State(state): State<AppState>,
    _auth: InternalAuth,
    params: Option<Json<TierRefreshParams>>,
) -> Result<Json<TierRefreshStats>> {
    let params = params.map(|Json(p)| p).unwrap_or_default();

    let stats =
        tier_refresh::refresh_recent_seller_tiers(&state.pool, &state.notifier, params.lookback_hours)
            .await?;

    Ok(Json(stats))
}

/// Accounts are provisioned by the identity service after signup.
async fn create_user(
    State(state): State<AppState>,
    _auth: InternalAuth,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<Profile>)> {
    let profile = Profile::create(
        &state.pool,
        CreateProfileData {
            display_name: body.display_name,
            email: body.email,
            rut: body.rut,
            role: body.role.as_deref().map(Role::parse_or_lowest),
        },
    )
    .await?;

    tracing::info!(user_id = %profile.id, role = %profile.role, "User provisioned");

    Ok((StatusCode::CREATED, Json(profile)))
}

async fn block_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>> {
    set_blocked(&state, &admin, id, true).await
}

async fn unblock_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>> {
    set_blocked(&state, &admin, id, false).await
}

async fn set_blocked(
    state: &AppState,
    admin: &Profile,
    id: Uuid,
    blocked: bool,
) -> Result<Json<Profile>> {
    if !Profile::set_blocked(&state.pool, id, blocked).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let event_type = if blocked { "user_blocked" } else { "user_unblocked" };
    AuditEvent::append(
        &state.pool,
        AuditEntry::new(event_type)
            .user(id)
            .metadata(json!({ "by": admin.id })),
    )
    .await?;

    tracing::info!(user_id = %id, admin_id = %admin.id, blocked, "User block state changed");

    let profile = Profile::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

/// Recent audit activity across the marketplace, newest first
async fn list_audit_events(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<AuditListParams>,
) -> Result<Json<Vec<AuditEvent>>> {
    let limit = params.limit.clamp(1, 500);
    let offset = params.offset.max(0);

    let events = AuditEvent::list_recent(&state.pool, limit, offset).await?;
    Ok(Json(events))
}

/// Audit activity touching one user, newest first
async fn list_user_audit_events(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Query(params): Query<AuditListParams>,
) -> Result<Json<Vec<AuditEvent>>> {
    let limit = params.limit.clamp(1, 500);

    let events = AuditEvent::list_by_user(&state.pool, id, limit).await?;
    Ok(Json(events))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/internal/jobs/payout-release", post(run_payout_release))
        .route("/internal/jobs/tier-refresh", post(run_tier_refresh))
        .route("/internal/users", post(create_user))
        .route("/internal/users/:id/block", post(block_user))
        .route("/internal/users/:id/unblock", post(unblock_user))
        .route("/internal/audit", get(list_audit_events))
        .route("/internal/users/:id/audit", get(list_user_audit_events))
}
