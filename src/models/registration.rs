use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Registered,
    Attended,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Attended => "attended",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRegistration {
    pub id: Uuid,
    pub attendee_id: Uuid,
    pub session_id: Uuid,
    pub event_id: Uuid,
    pub expected_booth_id: Option<Uuid>,
    pub status: String, // "registered", "attended", "cancelled"
    pub registration_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegistrationData {
    pub attendee_id: Uuid,
    pub session_id: Uuid,
    pub event_id: Uuid,
    pub expected_booth_id: Option<Uuid>,
}

impl SessionRegistration {
    /// Book an attendee into a session (a booth "meeting" when
    /// `expected_booth_id` is set).
    pub async fn create(
        pool: &PgPool,
        data: CreateRegistrationData,
    ) -> Result<Self, sqlx::Error> {
        let registration = sqlx::query_as::<_, SessionRegistration>(
            r#"
            INSERT INTO session_registrations (attendee_id, session_id, event_id, expected_booth_id, status)
            VALUES ($1, $2, $3, $4, 'registered')
            RETURNING *
            "#,
        )
        .bind(data.attendee_id)
        .bind(data.session_id)
        .bind(data.event_id)
        .bind(data.expected_booth_id)
        .fetch_one(pool)
        .await?;

        Ok(registration)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let registration = sqlx::query_as::<_, SessionRegistration>(
            r#"
            SELECT * FROM session_registrations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(registration)
    }

    /// Non-cancelled registrations held by an attendee — the set the scan
    /// classifier evaluates against.
    pub async fn list_active_for_attendee(
        pool: &PgPool,
        attendee_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let registrations = sqlx::query_as::<_, SessionRegistration>(
            r#"
            SELECT * FROM session_registrations
            WHERE attendee_id = $1 AND status != 'cancelled'
            ORDER BY registration_time ASC
            "#,
        )
        .bind(attendee_id)
        .fetch_all(pool)
        .await?;

        Ok(registrations)
    }

    pub async fn list_by_session(
        pool: &PgPool,
        session_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let registrations = sqlx::query_as::<_, SessionRegistration>(
            r#"
            SELECT * FROM session_registrations
            WHERE session_id = $1 AND status != 'cancelled'
            ORDER BY registration_time ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;

        Ok(registrations)
    }

    /// Count active (non-cancelled) registrations for a session, used for
    /// capacity enforcement at booking time.
    pub async fn count_active_for_session(
        pool: &PgPool,
        session_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM session_registrations
            WHERE session_id = $1 AND status != 'cancelled'
            "#,
        )
        .bind(session_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Transition `registered -> attended`. The status guard makes repeat
    /// scans idempotent on the transition; returns whether this call
    /// performed it.
    pub async fn mark_attended(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE session_registrations
            SET status = 'attended'
            WHERE id = $1 AND status = 'registered'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel a booking (soft delete)
    pub async fn cancel(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE session_registrations
            SET status = 'cancelled'
            WHERE id = $1 AND status = 'registered'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
