use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Delivery-tracking record for every email send attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailLog {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub recipient: String,
    pub template: String,
    pub provider_message_id: Option<String>,
    pub status: String, // "sent" or "failed"
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateEmailLogData {
    pub event_id: Option<Uuid>,
    pub recipient: String,
    pub template: String,
    pub provider_message_id: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

impl EmailLog {
    pub async fn create(pool: &PgPool, data: CreateEmailLogData) -> Result<Self, sqlx::Error> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            INSERT INTO email_logs (event_id, recipient, template, provider_message_id, status, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(&data.recipient)
        .bind(&data.template)
        .bind(&data.provider_message_id)
        .bind(&data.status)
        .bind(&data.error)
        .fetch_one(pool)
        .await?;

        Ok(log)
    }

    pub async fn list_by_event(
        pool: &PgPool,
        event_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let logs = sqlx::query_as::<_, EmailLog>(
            r#"
            SELECT * FROM email_logs
            WHERE event_id = $1
            ORDER BY sent_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(logs)
    }

    pub async fn count_by_status(
        pool: &PgPool,
        event_id: Uuid,
        status: &str,
    ) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM email_logs
            WHERE event_id = $1 AND status = $2
            "#,
        )
        .bind(event_id)
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
