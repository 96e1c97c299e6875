use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::error::{AppError, Result};
use crate::models::{
    booth::{Booth, CreateBoothData},
    event::{CreateEventData, Event},
    session::{BoothRestriction, CreateSessionData, ScanningContext, Session},
};

async fn create_event(
    State(state): State<AppState>,
    Json(data): Json<CreateEventData>,
) -> Result<(StatusCode, Json<Event>)> {
    if data.ends_on < data.starts_on {
        return Err(AppError::Validation(
            "event must end on or after its start date".to_string(),
        ));
    }

    let event = Event::create(&state.pool, data).await?;

    tracing::info!(event_id = %event.id, "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    let events = Event::list_active(&state.pool).await?;

    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Event>> {
    let event = Event::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(Json(event))
}

async fn deactivate_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode> {
    Event::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Event::deactivate(&state.pool, event_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateBoothParams {
    pub booth_name: String,
    pub exhibitor_name: String,
    pub booth_location: Option<String>,
}

async fn create_booth(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(params): Json<CreateBoothParams>,
) -> Result<(StatusCode, Json<Booth>)> {
    Event::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let booth = Booth::create(
        &state.pool,
        CreateBoothData {
            event_id,
            booth_name: params.booth_name,
            exhibitor_name: params.exhibitor_name,
            booth_location: params.booth_location,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booth)))
}

async fn list_booths(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<Booth>>> {
    let booths = Booth::list_by_event(&state.pool, event_id).await?;

    Ok(Json(booths))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionParams {
    pub booth_id: Option<Uuid>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub scanning_context: ScanningContext,
    #[serde(default)]
    pub requires_pre_assignment: bool,
    #[serde(default = "default_true")]
    pub allows_walk_ins: bool,
    #[serde(default)]
    pub has_capacity: bool,
    pub max_capacity: Option<i32>,
    #[serde(default = "default_restriction")]
    pub booth_restriction: BoothRestriction,
}

fn default_true() -> bool {
    true
}

fn default_restriction() -> BoothRestriction {
    BoothRestriction::None
}

async fn create_session(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(params): Json<CreateSessionParams>,
) -> Result<(StatusCode, Json<Session>)> {
    Event::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if let Some(booth_id) = params.booth_id {
        let booth = Booth::find_by_id(&state.pool, booth_id)
            .await?
            .ok_or_else(|| AppError::Validation("unknown booth".to_string()))?;
        if booth.event_id != event_id {
            return Err(AppError::Validation(
                "booth belongs to a different event".to_string(),
            ));
        }
    }

    let data = CreateSessionData {
        event_id,
        booth_id: params.booth_id,
        title: params.title,
        starts_at: params.starts_at,
        ends_at: params.ends_at,
        scanning_context: params.scanning_context,
        requires_pre_assignment: params.requires_pre_assignment,
        allows_walk_ins: params.allows_walk_ins,
        has_capacity: params.has_capacity,
        max_capacity: params.max_capacity,
        booth_restriction: params.booth_restriction,
    };

    data.validate().map_err(AppError::Validation)?;

    let session = Session::create(&state.pool, data).await?;

    tracing::info!(session_id = %session.id, event_id = %event_id, "Session created");

    Ok((StatusCode::CREATED, Json(session)))
}

async fn list_sessions(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<Session>>> {
    let sessions = Session::list_by_event(&state.pool, event_id).await?;

    Ok(Json(sessions))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", post(create_event).get(list_events))
        .route(
            "/api/events/:event_id",
            get(get_event).delete(deactivate_event),
        )
        .route(
            "/api/events/:event_id/booths",
            post(create_booth).get(list_booths),
        )
        .route(
            "/api/events/:event_id/sessions",
            post(create_session).get(list_sessions),
        )
}
