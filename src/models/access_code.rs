use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One-time numeric code granting an attendee portal login.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessCode {
    pub id: Uuid,
    pub attendee_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AccessCode {
    pub async fn create(
        pool: &PgPool,
        attendee_id: Uuid,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

        let access_code = sqlx::query_as::<_, AccessCode>(
            r#"
            INSERT INTO access_codes (attendee_id, code, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(attendee_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        Ok(access_code)
    }

    /// Consume a matching unexpired, unused code. The guarded UPDATE makes
    /// each code single-use even under concurrent verification attempts.
    pub async fn consume(
        pool: &PgPool,
        attendee_id: Uuid,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let consumed = sqlx::query_as::<_, AccessCode>(
            r#"
            UPDATE access_codes
            SET used_at = now()
            WHERE attendee_id = $1
              AND code = $2
              AND used_at IS NULL
              AND expires_at > now()
            RETURNING *
            "#,
        )
        .bind(attendee_id)
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(consumed)
    }

    /// Invalidate outstanding codes for an attendee (called before issuing
    /// a replacement so only the latest code works).
    pub async fn invalidate_outstanding(
        pool: &PgPool,
        attendee_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE access_codes
            SET used_at = now()
            WHERE attendee_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(attendee_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
