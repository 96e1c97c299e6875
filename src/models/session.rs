use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// What kind of scanning a session expects at its booth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanningContext {
    Presentation,
    BoothMeeting,
    Networking,
    Break,
}

impl ScanningContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanningContext::Presentation => "presentation",
            ScanningContext::BoothMeeting => "booth_meeting",
            ScanningContext::Networking => "networking",
            ScanningContext::Break => "break",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "presentation" => Some(ScanningContext::Presentation),
            "booth_meeting" => Some(ScanningContext::BoothMeeting),
            "networking" => Some(ScanningContext::Networking),
            "break" => Some(ScanningContext::Break),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoothRestriction {
    None,
    Assigned,
}

impl BoothRestriction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoothRestriction::None => "none",
            BoothRestriction::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(BoothRestriction::None),
            "assigned" => Some(BoothRestriction::Assigned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub event_id: Uuid,
    pub booth_id: Option<Uuid>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub scanning_context: String, // "presentation", "booth_meeting", "networking", "break"
    pub requires_pre_assignment: bool,
    pub allows_walk_ins: bool,
    pub has_capacity: bool,
    pub max_capacity: Option<i32>,
    pub booth_restriction: String, // "none" or "assigned"
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionData {
    pub event_id: Uuid,
    pub booth_id: Option<Uuid>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub scanning_context: ScanningContext,
    pub requires_pre_assignment: bool,
    pub allows_walk_ins: bool,
    pub has_capacity: bool,
    pub max_capacity: Option<i32>,
    pub booth_restriction: BoothRestriction,
}

impl CreateSessionData {
    /// Validates the configuration invariants before insert.
    ///
    /// A session that requires pre-assignment cannot also admit walk-ins,
    /// and a capacity limit needs an actual maximum.
    pub fn validate(&self) -> Result<(), String> {
        if self.requires_pre_assignment && self.allows_walk_ins {
            return Err(
                "a session requiring pre-assignment cannot allow walk-ins".to_string(),
            );
        }
        if self.has_capacity && self.max_capacity.is_none() {
            return Err("has_capacity requires max_capacity".to_string());
        }
        if self.ends_at <= self.starts_at {
            return Err("session must end after it starts".to_string());
        }
        Ok(())
    }
}

impl Session {
    /// Booth restriction as a typed value; unknown strings degrade to `None`
    /// (unrestricted) so a bad row never blocks scanning.
    pub fn restriction(&self) -> BoothRestriction {
        BoothRestriction::parse(&self.booth_restriction).unwrap_or(BoothRestriction::None)
    }

    pub async fn create(pool: &PgPool, data: CreateSessionData) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                event_id, booth_id, title, starts_at, ends_at,
                scanning_context, requires_pre_assignment, allows_walk_ins,
                has_capacity, max_capacity, booth_restriction
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(data.event_id)
        .bind(data.booth_id)
        .bind(data.title)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(data.scanning_context.as_str())
        .bind(data.requires_pre_assignment)
        .bind(data.allows_walk_ins)
        .bind(data.has_capacity)
        .bind(data.max_capacity)
        .bind(data.booth_restriction.as_str())
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE event_id = $1
            ORDER BY starts_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    /// Sessions whose time window contains `at` and whose booth is the
    /// scanned one. Ordered `(starts_at, id)` ascending, matching the
    /// classifier's tie-break when several sessions overlap at one booth.
    pub async fn list_active_at_booth(
        pool: &PgPool,
        booth_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE booth_id = $1
              AND starts_at <= $2
              AND ends_at > $2
            ORDER BY starts_at ASC, id ASC
            "#,
        )
        .bind(booth_id)
        .bind(at)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_config() -> CreateSessionData {
        let starts_at = Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
        CreateSessionData {
            event_id: Uuid::new_v4(),
            booth_id: None,
            title: "Opening keynote".to_string(),
            starts_at,
            ends_at: starts_at + chrono::Duration::hours(1),
            scanning_context: ScanningContext::Presentation,
            requires_pre_assignment: false,
            allows_walk_ins: true,
            has_capacity: false,
            max_capacity: None,
            booth_restriction: BoothRestriction::None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_pre_assignment_excludes_walk_ins() {
        let mut data = base_config();
        data.requires_pre_assignment = true;
        data.allows_walk_ins = true;
        assert!(data.validate().is_err());

        data.allows_walk_ins = false;
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_capacity_requires_maximum() {
        let mut data = base_config();
        data.has_capacity = true;
        data.max_capacity = None;
        assert!(data.validate().is_err());

        data.max_capacity = Some(25);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_window_must_be_positive() {
        let mut data = base_config();
        data.ends_at = data.starts_at;
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_unknown_restriction_degrades_to_none() {
        let data = base_config();
        let session = Session {
            id: Uuid::new_v4(),
            event_id: data.event_id,
            booth_id: None,
            title: data.title,
            starts_at: data.starts_at,
            ends_at: data.ends_at,
            scanning_context: "presentation".to_string(),
            requires_pre_assignment: false,
            allows_walk_ins: true,
            has_capacity: false,
            max_capacity: None,
            booth_restriction: "mystery".to_string(),
            created_at: data.starts_at,
        };

        assert_eq!(session.restriction(), BoothRestriction::None);
    }

    #[test]
    fn test_context_string_roundtrip() {
        for context in [
            ScanningContext::Presentation,
            ScanningContext::BoothMeeting,
            ScanningContext::Networking,
            ScanningContext::Break,
        ] {
            assert_eq!(ScanningContext::parse(context.as_str()), Some(context));
        }
        assert_eq!(ScanningContext::parse("lunch"), None);
    }
}
