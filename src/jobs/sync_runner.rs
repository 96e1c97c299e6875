use crate::services::sync::{PgRemote, SyncOutcome, SyncReconciler};

/// Periodic replay of the offline queue.
///
/// Runs on the scheduler interval; skips quietly when the queue is empty or
/// a sync is already in flight (manual "sync now" shares the same guard).
pub async fn run_sync_cycle(reconciler: &SyncReconciler<PgRemote>) {
    let pending = match reconciler.pending_count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, "Could not read offline queue");
            return;
        }
    };

    if pending == 0 {
        return;
    }

    tracing::info!(pending, "Starting scheduled sync cycle");

    match reconciler.sync_now().await {
        Ok(SyncOutcome::Completed(stats)) => {
            if stats.failed > 0 {
                tracing::warn!(
                    synced = stats.synced,
                    failed = stats.failed,
                    "Sync cycle finished with failures"
                );
            }
        }
        Ok(SyncOutcome::AlreadyRunning) => {
            tracing::debug!("Sync already in flight, skipping scheduled cycle");
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync cycle aborted");
        }
    }
}
