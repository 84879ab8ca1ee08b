use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::models::Order;
use crate::services::notifications::Notifier;
use crate::services::tiers;

#[derive(Debug, Serialize)]
pub struct TierRefreshStats {
    pub sellers_checked: usize,
    pub upgraded: usize,
    pub errors: usize,
}

/// Batch job that recomputes seller tiers.
///
/// Only sellers with a sale confirmed inside the lookback window are
/// recomputed; everyone else's tier cannot have changed. Upgrades go
/// through the rank-guarded update, so running this concurrently with
/// itself is harmless.
pub async fn refresh_recent_seller_tiers(
    pool: &PgPool,
    notifier: &Notifier,
    lookback_hours: i64,
) -> Result<TierRefreshStats, sqlx::Error> {
    let mut stats = TierRefreshStats {
        sellers_checked: 0,
        upgraded: 0,
        errors: 0,
    };

    let since = Utc::now() - Duration::hours(lookback_hours);
    let seller_ids = Order::sellers_with_sales_since(pool, since).await?;
    stats.sellers_checked = seller_ids.len();

    tracing::info!(
        sellers = stats.sellers_checked,
        lookback_hours,
        "Starting tier refresh job"
    );

    for seller_id in seller_ids {
        match tiers::sync_seller_tier(pool, notifier, seller_id).await {
            Ok(decision) => {
                if decision.upgraded {
                    stats.upgraded += 1;
                }
            }
            Err(e) => {
                tracing::error!(
                    seller_id = %seller_id,
                    error = %e,
                    "Error refreshing seller tier"
                );
                stats.errors += 1;
            }
        }
    }

    tracing::info!(?stats, "Tier refresh job completed");

    Ok(stats)
}
