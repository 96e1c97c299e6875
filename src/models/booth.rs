use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booth {
    pub id: Uuid,
    pub event_id: Uuid,
    pub booth_name: String,
    pub exhibitor_name: String,
    pub booth_location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoothData {
    pub event_id: Uuid,
    pub booth_name: String,
    pub exhibitor_name: String,
    pub booth_location: Option<String>,
}

impl Booth {
    pub async fn create(pool: &PgPool, data: CreateBoothData) -> Result<Self, sqlx::Error> {
        let booth = sqlx::query_as::<_, Booth>(
            r#"
            INSERT INTO booths (event_id, booth_name, exhibitor_name, booth_location)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.booth_name)
        .bind(data.exhibitor_name)
        .bind(data.booth_location)
        .fetch_one(pool)
        .await?;

        Ok(booth)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let booth = sqlx::query_as::<_, Booth>(
            r#"
            SELECT * FROM booths WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(booth)
    }

    pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let booths = sqlx::query_as::<_, Booth>(
            r#"
            SELECT * FROM booths
            WHERE event_id = $1
            ORDER BY booth_name ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await?;

        Ok(booths)
    }
}
