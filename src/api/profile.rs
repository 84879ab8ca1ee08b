use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::auth::{AppState, CurrentUser};
use crate::error::{AppError, Result};
use crate::models::Profile;
use crate::services::tiers;

/// The caller's own profile. Viewing it recomputes the seller tier, so a
/// seller who just crossed a threshold sees the upgrade immediately
/// instead of waiting for the next batch run.
async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Profile>> {
    let decision = tiers::sync_seller_tier(&state.pool, &state.notifier, user.id).await?;

    if !decision.upgraded {
        return Ok(Json(user));
    }

    let profile = Profile::find_by_id(&state.pool, user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(profile))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}
