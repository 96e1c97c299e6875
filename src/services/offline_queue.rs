use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::registration::CreateRegistrationData;
use crate::models::scan::CreateScanData;

/// A mutating action recorded locally while the remote store was
/// unreachable. The payload is the typed shape of the remote write it
/// stands in for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuedAction {
    CheckIn {
        attendee_id: Uuid,
        event_id: Uuid,
        checked_in_at: DateTime<Utc>,
    },
    Registration {
        registration: CreateRegistrationData,
    },
    Scan {
        scan: CreateScanData,
        mark_attended: Option<Uuid>,
    },
}

impl QueuedAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            QueuedAction::CheckIn { .. } => "check_in",
            QueuedAction::Registration { .. } => "registration",
            QueuedAction::Scan { .. } => "scan",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingAction {
    pub id: i64,
    pub action_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub synced: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn decode(&self) -> Result<QueuedAction, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Durable, append-only queue of actions awaiting replay, backed by the
/// local SQLite store so it survives process restarts.
#[derive(Clone)]
pub struct OfflineQueue {
    local: SqlitePool,
}

impl OfflineQueue {
    /// Opens the queue over a local pool, creating the table on first use.
    pub async fn open(local: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                next_attempt_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&local)
        .await?;

        Ok(Self { local })
    }

    /// Stores an action with `synced = false`. Local writes are expected to
    /// succeed; there is no validation beyond the payload shape.
    pub async fn enqueue(
        &self,
        action: &QueuedAction,
        created_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let payload =
            serde_json::to_string(action).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO pending_actions (action_type, payload, created_at, synced, attempts, next_attempt_at)
            VALUES ($1, $2, $3, 0, 0, $4)
            "#,
        )
        .bind(action.action_type())
        .bind(payload)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.local)
        .await?;

        tracing::debug!(
            action_type = action.action_type(),
            id = result.last_insert_rowid(),
            "Enqueued offline action"
        );

        Ok(result.last_insert_rowid())
    }

    /// Number of unsynced actions (drives the sync status indicator)
    pub async fn count_pending(&self) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM pending_actions WHERE synced = 0
            "#,
        )
        .fetch_one(&self.local)
        .await?;

        Ok(count)
    }

    /// Unsynced actions eligible for replay at `now`, oldest first.
    ///
    /// Actions backing off (`next_attempt_at` in the future) or past
    /// `max_attempts` are skipped; everything else comes back in
    /// `(created_at, id)` order so replay preserves enqueue order.
    pub async fn list_pending(
        &self,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Vec<PendingAction>, sqlx::Error> {
        let actions = sqlx::query_as::<_, PendingAction>(
            r#"
            SELECT * FROM pending_actions
            WHERE synced = 0
              AND attempts < $1
              AND next_attempt_at <= $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(max_attempts)
        .bind(now)
        .fetch_all(&self.local)
        .await?;

        Ok(actions)
    }

    pub async fn mark_synced(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pending_actions SET synced = 1 WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.local)
        .await?;

        Ok(())
    }

    /// Records a failed replay attempt and schedules the next one
    pub async fn record_failure(
        &self,
        id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pending_actions
            SET attempts = attempts + 1,
                last_error = $2,
                next_attempt_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.local)
        .await?;

        Ok(())
    }

    /// Deletes all synced actions, returning how many were removed
    pub async fn purge_synced(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_actions WHERE synced = 1
            "#,
        )
        .execute(&self.local)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_queue() -> OfflineQueue {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        OfflineQueue::open(pool).await.unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn check_in_action() -> QueuedAction {
        QueuedAction::CheckIn {
            attendee_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            checked_in_at: t0(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_count() {
        let queue = memory_queue().await;
        assert_eq!(queue.count_pending().await.unwrap(), 0);

        queue.enqueue(&check_in_action(), t0()).await.unwrap();
        queue
            .enqueue(&check_in_action(), t0() + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(queue.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_pending_ordered_by_timestamp() {
        let queue = memory_queue().await;

        // Enqueued out of timestamp order on purpose
        queue
            .enqueue(&check_in_action(), t0() + Duration::seconds(30))
            .await
            .unwrap();
        queue.enqueue(&check_in_action(), t0()).await.unwrap();
        queue
            .enqueue(&check_in_action(), t0() + Duration::seconds(10))
            .await
            .unwrap();

        let pending = queue
            .list_pending(t0() + Duration::minutes(5), 8)
            .await
            .unwrap();

        assert_eq!(pending.len(), 3);
        let timestamps: Vec<_> = pending.iter().map(|a| a.created_at).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
    }

    #[tokio::test]
    async fn test_payload_roundtrip() {
        let queue = memory_queue().await;
        let action = check_in_action();
        queue.enqueue(&action, t0()).await.unwrap();

        let pending = queue.list_pending(t0(), 8).await.unwrap();
        assert_eq!(pending[0].action_type, "check_in");

        let decoded = pending[0].decode().unwrap();
        match (action, decoded) {
            (
                QueuedAction::CheckIn { attendee_id, .. },
                QueuedAction::CheckIn {
                    attendee_id: decoded_id,
                    ..
                },
            ) => assert_eq!(attendee_id, decoded_id),
            _ => panic!("decoded to a different action type"),
        }
    }

    #[tokio::test]
    async fn test_mark_synced_then_purge_removes_exactly_marked() {
        let queue = memory_queue().await;

        let first = queue.enqueue(&check_in_action(), t0()).await.unwrap();
        let second = queue
            .enqueue(&check_in_action(), t0() + Duration::seconds(1))
            .await
            .unwrap();
        let third = queue
            .enqueue(&check_in_action(), t0() + Duration::seconds(2))
            .await
            .unwrap();

        queue.mark_synced(first).await.unwrap();
        queue.mark_synced(third).await.unwrap();

        let purged = queue.purge_synced().await.unwrap();
        assert_eq!(purged, 2);

        let remaining = queue.list_pending(t0() + Duration::minutes(1), 8).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second);
    }

    #[tokio::test]
    async fn test_marked_action_no_longer_pending() {
        let queue = memory_queue().await;
        let id = queue.enqueue(&check_in_action(), t0()).await.unwrap();

        queue.mark_synced(id).await.unwrap();

        assert_eq!(queue.count_pending().await.unwrap(), 0);
        assert!(queue.list_pending(t0(), 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backoff_hides_action_until_due() {
        let queue = memory_queue().await;
        let id = queue.enqueue(&check_in_action(), t0()).await.unwrap();

        queue
            .record_failure(id, "connection refused", t0() + Duration::minutes(5))
            .await
            .unwrap();

        // Still counted as pending, but not eligible before its retry time.
        assert_eq!(queue.count_pending().await.unwrap(), 1);
        assert!(queue
            .list_pending(t0() + Duration::minutes(1), 8)
            .await
            .unwrap()
            .is_empty());

        let due = queue
            .list_pending(t0() + Duration::minutes(6), 8)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_max_attempts_excludes_action() {
        let queue = memory_queue().await;
        let id = queue.enqueue(&check_in_action(), t0()).await.unwrap();

        for _ in 0..3 {
            queue.record_failure(id, "boom", t0()).await.unwrap();
        }

        assert!(queue
            .list_pending(t0() + Duration::minutes(1), 3)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            queue
                .list_pending(t0() + Duration::minutes(1), 4)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
