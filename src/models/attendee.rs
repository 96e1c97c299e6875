use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendee {
    pub id: Uuid,
    pub event_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttendeeData {
    pub event_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company: Option<String>,
}

impl Attendee {
    /// Register a new attendee for an event
    pub async fn create(pool: &PgPool, data: CreateAttendeeData) -> Result<Self, sqlx::Error> {
        let attendee = sqlx::query_as::<_, Attendee>(
            r#"
            INSERT INTO attendees (event_id, full_name, email, company)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.full_name)
        .bind(data.email)
        .bind(data.company)
        .fetch_one(pool)
        .await?;

        Ok(attendee)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let attendee = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT * FROM attendees WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(attendee)
    }

    /// Find an attendee by email within one event (email is unique per event)
    pub async fn find_by_email(
        pool: &PgPool,
        event_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let attendee = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT * FROM attendees
            WHERE event_id = $1 AND email = $2
            "#,
        )
        .bind(event_id)
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(attendee)
    }

    /// List attendees for an event
    pub async fn list_by_event(
        pool: &PgPool,
        event_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let attendees = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT * FROM attendees
            WHERE event_id = $1
            ORDER BY created_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(attendees)
    }

    /// Record the entrance check-in time. Guarded so a repeat check-in
    /// keeps the original timestamp; returns whether this call set it.
    pub async fn set_checked_in(
        pool: &PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE attendees
            SET checked_in_at = $2
            WHERE id = $1 AND checked_in_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count attendees checked in at an event
    pub async fn count_checked_in(pool: &PgPool, event_id: Uuid) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM attendees
            WHERE event_id = $1 AND checked_in_at IS NOT NULL
            "#,
        )
        .bind(event_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
