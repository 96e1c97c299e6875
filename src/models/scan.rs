use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One physical or virtual touchpoint. Immutable once written — the
/// authoritative audit log scans are reconciled and reported from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub attendee_id: Uuid,
    pub booth_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub expected_booth_id: Option<Uuid>,
    pub scanned_at: DateTime<Utc>,
    pub scan_status: String, // "expected", "walk_in", "wrong_booth", "out_of_schedule", "regular"
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScanData {
    pub event_id: Uuid,
    pub attendee_id: Uuid,
    pub booth_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub expected_booth_id: Option<Uuid>,
    pub scanned_at: DateTime<Utc>,
    pub scan_status: String,
    pub notes: Option<String>,
}

impl ScanRecord {
    /// Append a scan to the log
    pub async fn create(pool: &PgPool, data: CreateScanData) -> Result<Self, sqlx::Error> {
        let scan = sqlx::query_as::<_, ScanRecord>(
            r#"
            INSERT INTO scan_records (event_id, attendee_id, booth_id, session_id, expected_booth_id, scanned_at, scan_status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.attendee_id)
        .bind(data.booth_id)
        .bind(data.session_id)
        .bind(data.expected_booth_id)
        .bind(data.scanned_at)
        .bind(data.scan_status)
        .bind(data.notes)
        .fetch_one(pool)
        .await?;

        Ok(scan)
    }

    /// List scans for an event, newest first
    pub async fn list_by_event(
        pool: &PgPool,
        event_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let scans = sqlx::query_as::<_, ScanRecord>(
            r#"
            SELECT * FROM scan_records
            WHERE event_id = $1
            ORDER BY scanned_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(scans)
    }

    pub async fn list_by_attendee(
        pool: &PgPool,
        attendee_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let scans = sqlx::query_as::<_, ScanRecord>(
            r#"
            SELECT * FROM scan_records
            WHERE attendee_id = $1
            ORDER BY scanned_at DESC
            "#,
        )
        .bind(attendee_id)
        .fetch_all(pool)
        .await?;

        Ok(scans)
    }

    /// Count scans by event, optionally filtered to one status
    pub async fn count_by_event_and_status(
        pool: &PgPool,
        event_id: Uuid,
        status: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let count = if let Some(status) = status {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM scan_records
                WHERE event_id = $1 AND scan_status = $2
                "#,
            )
            .bind(event_id)
            .bind(status)
            .fetch_one(pool)
            .await?
        } else {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM scan_records
                WHERE event_id = $1
                "#,
            )
            .bind(event_id)
            .fetch_one(pool)
            .await?
        };

        Ok(count)
    }

    /// Count distinct attendees scanned at an event
    pub async fn count_unique_attendees(
        pool: &PgPool,
        event_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT attendee_id)
            FROM scan_records
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
