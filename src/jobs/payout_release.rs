use serde::Serialize;
use sqlx::PgPool;

use crate::models::WalletMovement;
use crate::services::notifications::Notifier;
use crate::services::orders::{self, ReleaseOutcome};

#[derive(Debug, Serialize)]
pub struct PayoutReleaseStats {
    pub total_eligible: usize,
    pub released: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Batch job that pays out matured escrow.
///
/// Scans sale credits whose availability time has passed, releases each one
/// and completes its order. Eligibility is decided entirely by the stored
/// `available_from`; running the job more or less often changes when money
/// moves, never whether it may.
pub async fn release_due_payouts(
    pool: &PgPool,
    notifier: &Notifier,
    batch_size: i64,
) -> Result<PayoutReleaseStats, sqlx::Error> {
    let mut stats = PayoutReleaseStats {
        total_eligible: 0,
        released: 0,
        skipped: 0,
        errors: 0,
    };

    let movements = WalletMovement::find_release_ready(pool, batch_size).await?;
    stats.total_eligible = movements.len();

    tracing::info!(
        total_eligible = stats.total_eligible,
        "Starting payout release job"
    );

    for movement in movements {
        match orders::release_escrow(pool, notifier, movement.order_id).await {
            Ok(ReleaseOutcome::Released(_)) => {
                stats.released += 1;
            }
            Ok(ReleaseOutcome::Skipped) => {
                // A dispute can land between the scan and the release.
                stats.skipped += 1;
            }
            Err(e) => {
                tracing::error!(
                    order_id = %movement.order_id,
                    error = %e,
                    "Error releasing escrowed credit"
                );
                stats.errors += 1;
            }
        }
    }

    tracing::info!(?stats, "Payout release job completed");

    Ok(stats)
}
