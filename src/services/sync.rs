use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::attendee::Attendee;
use crate::models::registration::{CreateRegistrationData, SessionRegistration};
use crate::models::scan::{CreateScanData, ScanRecord};
use crate::services::offline_queue::{OfflineQueue, QueuedAction};

/// The remote writes the reconciler replays queued actions against.
///
/// Implementations must tolerate at-least-once delivery: an action that
/// reached the remote before a crash may be replayed again.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert_registration(&self, data: CreateRegistrationData) -> anyhow::Result<()>;

    async fn set_checked_in(&self, attendee_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn insert_scan(
        &self,
        data: CreateScanData,
        mark_attended: Option<Uuid>,
    ) -> anyhow::Result<()>;
}

/// Production remote store: the Postgres pool.
#[derive(Clone)]
pub struct PgRemote {
    pool: PgPool,
}

impl PgRemote {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RemoteStore for PgRemote {
    async fn insert_registration(&self, data: CreateRegistrationData) -> anyhow::Result<()> {
        SessionRegistration::create(&self.pool, data).await?;
        Ok(())
    }

    async fn set_checked_in(&self, attendee_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        // Guarded update: a replayed check-in keeps the original timestamp.
        Attendee::set_checked_in(&self.pool, attendee_id, at).await?;
        Ok(())
    }

    async fn insert_scan(
        &self,
        data: CreateScanData,
        mark_attended: Option<Uuid>,
    ) -> anyhow::Result<()> {
        ScanRecord::create(&self.pool, data).await?;
        if let Some(registration_id) = mark_attended {
            SessionRegistration::mark_attended(&self.pool, registration_id).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncStats {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub purged: u64,
}

#[derive(Debug)]
pub enum SyncOutcome {
    Completed(SyncStats),
    /// A sync was already in flight; this request was a no-op.
    AlreadyRunning,
}

/// Replays the offline queue against the remote store.
///
/// At most one sync runs at a time; the guard flag makes a second request a
/// no-op rather than queueing it. Per-action failures are isolated — the
/// failed action stays queued with exponential backoff while the rest of
/// the queue is still attempted in order.
pub struct SyncReconciler<R: RemoteStore> {
    queue: OfflineQueue,
    remote: R,
    syncing: AtomicBool,
    max_attempts: i32,
    backoff_base_secs: i64,
}

impl<R: RemoteStore> SyncReconciler<R> {
    pub fn new(queue: OfflineQueue, remote: R, max_attempts: i32, backoff_base_secs: i64) -> Self {
        Self {
            queue,
            remote,
            syncing: AtomicBool::new(false),
            max_attempts,
            backoff_base_secs,
        }
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    pub async fn pending_count(&self) -> Result<i64, sqlx::Error> {
        self.queue.count_pending().await
    }

    /// Runs one sync cycle, unless one is already in flight.
    #[tracing::instrument(skip(self))]
    pub async fn sync_now(&self) -> Result<SyncOutcome, sqlx::Error> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync already in flight, ignoring request");
            return Ok(SyncOutcome::AlreadyRunning);
        }

        let result = self.run_cycle().await;
        self.syncing.store(false, Ordering::SeqCst);

        result.map(SyncOutcome::Completed)
    }

    async fn run_cycle(&self) -> Result<SyncStats, sqlx::Error> {
        let now = Utc::now();
        let pending = self.queue.list_pending(now, self.max_attempts).await?;
        let mut stats = SyncStats::default();

        for action in pending {
            stats.attempted += 1;

            let replay = match action.decode() {
                Ok(decoded) => self.dispatch(decoded).await,
                Err(e) => Err(anyhow::anyhow!("undecodable payload: {}", e)),
            };

            match replay {
                Ok(()) => {
                    self.queue.mark_synced(action.id).await?;
                    stats.synced += 1;
                }
                Err(e) => {
                    // Leave it queued and move on; the rest of the queue is
                    // still attempted in order.
                    let delay = backoff_delay(self.backoff_base_secs, action.attempts);
                    tracing::warn!(
                        action_id = action.id,
                        action_type = %action.action_type,
                        attempts = action.attempts + 1,
                        retry_in_secs = delay.num_seconds(),
                        error = %e,
                        "Replay failed"
                    );
                    self.queue
                        .record_failure(action.id, &e.to_string(), now + delay)
                        .await?;
                    stats.failed += 1;
                }
            }
        }

        stats.purged = self.queue.purge_synced().await?;

        tracing::info!(
            attempted = stats.attempted,
            synced = stats.synced,
            failed = stats.failed,
            purged = stats.purged,
            "Sync cycle completed"
        );

        Ok(stats)
    }

    async fn dispatch(&self, action: QueuedAction) -> anyhow::Result<()> {
        match action {
            QueuedAction::CheckIn {
                attendee_id,
                checked_in_at,
                ..
            } => self.remote.set_checked_in(attendee_id, checked_in_at).await,
            QueuedAction::Registration { registration } => {
                self.remote.insert_registration(registration).await
            }
            QueuedAction::Scan {
                scan,
                mark_attended,
            } => self.remote.insert_scan(scan, mark_attended).await,
        }
    }
}

/// Exponential backoff: `base * 2^attempts`, capped at one hour.
fn backoff_delay(base_secs: i64, attempts: i64) -> Duration {
    let shift = attempts.clamp(0, 6) as u32;
    let secs = base_secs.saturating_mul(1i64 << shift).min(3600);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;

    /// Records applied actions and fails those whose marker is listed.
    #[derive(Default)]
    struct FakeRemote {
        applied: Mutex<Vec<String>>,
        fail_attendees: Mutex<Vec<Uuid>>,
        delay_ms: u64,
    }

    impl FakeRemote {
        fn fail_for(&self, attendee_id: Uuid) {
            self.fail_attendees.lock().unwrap().push(attendee_id);
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }

        async fn apply(&self, label: String, attendee_id: Uuid) -> anyhow::Result<()> {
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_attendees.lock().unwrap().contains(&attendee_id) {
                anyhow::bail!("remote unavailable");
            }
            self.applied.lock().unwrap().push(label);
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn insert_registration(&self, data: CreateRegistrationData) -> anyhow::Result<()> {
            self.apply("registration".to_string(), data.attendee_id).await
        }

        async fn set_checked_in(
            &self,
            attendee_id: Uuid,
            _at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.apply("check_in".to_string(), attendee_id).await
        }

        async fn insert_scan(
            &self,
            data: CreateScanData,
            _mark_attended: Option<Uuid>,
        ) -> anyhow::Result<()> {
            self.apply("scan".to_string(), data.attendee_id).await
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    async fn memory_queue() -> OfflineQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        OfflineQueue::open(pool).await.unwrap()
    }

    fn check_in(attendee_id: Uuid) -> QueuedAction {
        QueuedAction::CheckIn {
            attendee_id,
            event_id: Uuid::new_v4(),
            checked_in_at: t0(),
        }
    }

    fn scan(attendee_id: Uuid) -> QueuedAction {
        QueuedAction::Scan {
            scan: CreateScanData {
                event_id: Uuid::new_v4(),
                attendee_id,
                booth_id: Some(Uuid::new_v4()),
                session_id: None,
                expected_booth_id: None,
                scanned_at: t0(),
                scan_status: "walk_in".to_string(),
                notes: None,
            },
            mark_attended: None,
        }
    }

    fn registration(attendee_id: Uuid) -> QueuedAction {
        QueuedAction::Registration {
            registration: CreateRegistrationData {
                attendee_id,
                session_id: Uuid::new_v4(),
                event_id: Uuid::new_v4(),
                expected_booth_id: None,
            },
        }
    }

    #[tokio::test]
    async fn test_replays_all_actions_in_enqueue_order() {
        let queue = memory_queue().await;
        let attendee = Uuid::new_v4();

        queue.enqueue(&check_in(attendee), t0()).await.unwrap();
        queue
            .enqueue(&scan(attendee), t0() + Duration::seconds(1))
            .await
            .unwrap();
        queue
            .enqueue(&registration(attendee), t0() + Duration::seconds(2))
            .await
            .unwrap();

        let reconciler = SyncReconciler::new(queue.clone(), FakeRemote::default(), 8, 30);
        let outcome = reconciler.sync_now().await.unwrap();

        let stats = match outcome {
            SyncOutcome::Completed(stats) => stats,
            SyncOutcome::AlreadyRunning => panic!("sync should have run"),
        };

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.synced, 3);
        assert_eq!(stats.purged, 3);
        assert_eq!(
            reconciler.remote.applied(),
            vec!["check_in", "scan", "registration"]
        );
        assert_eq!(queue.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_later_actions_still_attempted() {
        let queue = memory_queue().await;
        let ok_attendee = Uuid::new_v4();
        let bad_attendee = Uuid::new_v4();

        // check-in, scan, registration in that order; the second one fails.
        queue.enqueue(&check_in(ok_attendee), t0()).await.unwrap();
        queue
            .enqueue(&scan(bad_attendee), t0() + Duration::seconds(1))
            .await
            .unwrap();
        queue
            .enqueue(&registration(ok_attendee), t0() + Duration::seconds(2))
            .await
            .unwrap();

        let remote = FakeRemote::default();
        remote.fail_for(bad_attendee);

        let reconciler = SyncReconciler::new(queue.clone(), remote, 8, 30);
        let outcome = reconciler.sync_now().await.unwrap();

        let stats = match outcome {
            SyncOutcome::Completed(stats) => stats,
            SyncOutcome::AlreadyRunning => panic!("sync should have run"),
        };

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.synced, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.purged, 2);

        // First and third replayed; the failed scan is still queued.
        assert_eq!(
            reconciler.remote.applied(),
            vec!["check_in", "registration"]
        );
        assert_eq!(queue.count_pending().await.unwrap(), 1);
        let remaining = queue
            .list_pending(t0() + Duration::hours(2), 8)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].action_type, "scan");
        assert_eq!(remaining[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_failed_action_backs_off_before_retry() {
        let queue = memory_queue().await;
        let bad_attendee = Uuid::new_v4();
        queue.enqueue(&check_in(bad_attendee), t0()).await.unwrap();

        let remote = FakeRemote::default();
        remote.fail_for(bad_attendee);
        let reconciler = SyncReconciler::new(queue.clone(), remote, 8, 30);

        reconciler.sync_now().await.unwrap();

        // Immediately after the failure the action is backing off, so the
        // next cycle has nothing eligible.
        let outcome = reconciler.sync_now().await.unwrap();
        let stats = match outcome {
            SyncOutcome::Completed(stats) => stats,
            SyncOutcome::AlreadyRunning => panic!("sync should have run"),
        };
        assert_eq!(stats.attempted, 0);
        assert_eq!(queue.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sync_request_is_noop() {
        let queue = memory_queue().await;
        queue.enqueue(&check_in(Uuid::new_v4()), t0()).await.unwrap();

        let remote = FakeRemote {
            delay_ms: 50,
            ..FakeRemote::default()
        };
        let reconciler = SyncReconciler::new(queue.clone(), remote, 8, 30);

        let (first, second) = tokio::join!(reconciler.sync_now(), async {
            // Let the first sync acquire the guard before asking again.
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            reconciler.sync_now().await
        });

        assert!(matches!(first.unwrap(), SyncOutcome::Completed(_)));
        assert!(matches!(second.unwrap(), SyncOutcome::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_undecodable_payload_counts_as_failure() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let queue = OfflineQueue::open(pool.clone()).await.unwrap();
        queue.enqueue(&check_in(Uuid::new_v4()), t0()).await.unwrap();

        // Corrupt the stored payload behind the queue's back.
        sqlx::query("UPDATE pending_actions SET payload = 'garbage'")
            .execute(&pool)
            .await
            .unwrap();

        let reconciler = SyncReconciler::new(queue.clone(), FakeRemote::default(), 8, 30);
        let outcome = reconciler.sync_now().await.unwrap();

        let stats = match outcome {
            SyncOutcome::Completed(stats) => stats,
            SyncOutcome::AlreadyRunning => panic!("sync should have run"),
        };
        assert_eq!(stats.failed, 1);
        assert_eq!(queue.count_pending().await.unwrap(), 1);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(30, 0), Duration::seconds(30));
        assert_eq!(backoff_delay(30, 1), Duration::seconds(60));
        assert_eq!(backoff_delay(30, 3), Duration::seconds(240));
        assert_eq!(backoff_delay(30, 100), Duration::seconds(1920));
        assert_eq!(backoff_delay(120, 100), Duration::seconds(3600));
    }
}
