//! Periodic expiry of allocations past their end date.
//!
//! Every tick, Active allocations whose end date is before today are moved
//! to Expired through [`AllocationStatusRunner`], so each one gets the same
//! history record and notification as an operator-initiated change.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rcalloc_core::allocation::AllocationStatus;
use rcalloc_core::config::WorkflowConfig;
use rcalloc_core::types::Date;
use rcalloc_db::repositories::AllocationRepo;
use rcalloc_db::DbPool;
use rcalloc_events::Mailer;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::workflow::AllocationStatusRunner;

/// Run the expiry loop until `cancel` is triggered.
pub async fn run(
    pool: DbPool,
    mailer: Arc<dyn Mailer>,
    config: Arc<WorkflowConfig>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Allocation expiry job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Allocation expiry job stopping");
                break;
            }
            _ = ticker.tick() => {
                let today = Utc::now().date_naive();
                match expire_due(&pool, mailer.as_ref(), &config, today).await {
                    Ok(0) => tracing::debug!("Allocation expiry: nothing to expire"),
                    Ok(expired) => tracing::info!(expired, "Allocation expiry: expired allocations"),
                    Err(e) => tracing::error!(error = %e, "Allocation expiry: scan failed"),
                }
            }
        }
    }
}

/// Expire every Active allocation that ended before `today`.
///
/// A failure on one allocation is logged and does not stop the others.
/// Returns how many were expired.
pub async fn expire_due(
    pool: &DbPool,
    mailer: &dyn Mailer,
    config: &WorkflowConfig,
    today: Date,
) -> AppResult<usize> {
    let runner = AllocationStatusRunner::new(pool, mailer, config);
    let mut expired = 0;

    for id in AllocationRepo::list_expirable_ids(pool, today).await? {
        match runner
            .change_status(None, id, AllocationStatus::Expired, today)
            .await
        {
            Ok(_) => expired += 1,
            Err(e) => {
                tracing::error!(allocation_id = id, error = %e, "Failed to expire allocation");
            }
        }
    }

    Ok(expired)
}
