use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AuditEntry, AuditEvent, Order, Profile, Role};
use crate::services::notifications::Notifier;

/// Seller tier ladder. A seller qualifies for a step once their paid-sale
/// count reaches `ops_required`; the exact threshold already qualifies.
pub const TIER_LADDER: [(Role, i64); 4] = [
    (Role::Basic, 0),
    (Role::Pro, 5),
    (Role::Premium, 20),
    (Role::Elite, 50),
];

/// Highest ladder step the given sale count qualifies for.
pub fn role_for_sales(sold_count: i64) -> Role {
    let mut role = Role::Basic;
    for (step, ops_required) in TIER_LADDER {
        if sold_count >= ops_required {
            role = step;
        }
    }
    role
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDecision {
    pub role: Role,
    pub upgraded: bool,
}

/// Tier changes only ever go up. A computed role at or below the current
/// rank leaves the profile untouched, which also protects `free` and
/// `admin` accounts from being pulled back onto the ladder.
pub fn apply_upgrade(current: Role, computed: Role) -> TierDecision {
    if computed.rank() > current.rank() {
        TierDecision {
            role: computed,
            upgraded: true,
        }
    } else {
        TierDecision {
            role: current,
            upgraded: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TierSyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Seller not found")]
    SellerNotFound,
}

/// Recomputes a seller's tier from their historical paid sales and applies
/// it when it is an upgrade. The rank-guarded update in the database is
/// what actually decides; a concurrent sync can win the race and this call
/// then reports no upgrade.
#[tracing::instrument(skip(pool, notifier), fields(seller_id = %seller_id))]
pub async fn sync_seller_tier(
    pool: &PgPool,
    notifier: &Notifier,
    seller_id: Uuid,
) -> Result<TierDecision, TierSyncError> {
    let seller = Profile::find_by_id(pool, seller_id)
        .await?
        .ok_or(TierSyncError::SellerNotFound)?;

    let sold_count = Order::count_paid_sales(pool, seller_id).await?;
    let computed = role_for_sales(sold_count);
    let decision = apply_upgrade(seller.role, computed);

    if !decision.upgraded {
        return Ok(decision);
    }

    let mut tx = pool.begin().await?;
    let applied = Profile::promote_role(&mut *tx, seller_id, computed).await?;
    if !applied {
        tx.rollback().await?;
        return Ok(TierDecision {
            role: seller.role,
            upgraded: false,
        });
    }

    AuditEvent::append(
        &mut *tx,
        AuditEntry::new("tier_upgraded").user(seller_id).metadata(json!({
            "from": seller.role,
            "to": computed,
            "paid_sales": sold_count,
        })),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        seller_id = %seller_id,
        from = %seller.role,
        to = %computed,
        paid_sales = sold_count,
        "seller tier upgraded"
    );
    notifier.tier_upgraded(&seller, computed).await;

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sales_is_basic() {
        assert_eq!(role_for_sales(0), Role::Basic);
        assert_eq!(role_for_sales(4), Role::Basic);
    }

    #[test]
    fn test_exact_thresholds_qualify() {
        assert_eq!(role_for_sales(5), Role::Pro);
        assert_eq!(role_for_sales(20), Role::Premium);
        assert_eq!(role_for_sales(50), Role::Elite);
    }

    #[test]
    fn test_between_thresholds_keeps_the_lower_step() {
        assert_eq!(role_for_sales(19), Role::Pro);
        assert_eq!(role_for_sales(49), Role::Premium);
        assert_eq!(role_for_sales(5000), Role::Elite);
    }

    #[test]
    fn test_role_for_sales_is_monotone() {
        let mut last = role_for_sales(0).rank();
        for sold in 1..60 {
            let rank = role_for_sales(sold).rank();
            assert!(rank >= last, "rank regressed at {sold} sales");
            last = rank;
        }
    }

    #[test]
    fn test_upgrades_apply_only_upward() {
        let up = apply_upgrade(Role::Basic, Role::Pro);
        assert!(up.upgraded);
        assert_eq!(up.role, Role::Pro);

        let same = apply_upgrade(Role::Pro, Role::Pro);
        assert!(!same.upgraded);
        assert_eq!(same.role, Role::Pro);

        let down = apply_upgrade(Role::Premium, Role::Pro);
        assert!(!down.upgraded);
        assert_eq!(down.role, Role::Premium);
    }

    #[test]
    fn test_out_of_ladder_roles_are_never_overwritten() {
        for computed in [Role::Basic, Role::Pro, Role::Premium, Role::Elite] {
            assert!(!apply_upgrade(Role::Free, computed).upgraded);
            assert!(!apply_upgrade(Role::Admin, computed).upgraded);
        }
    }
}
