use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::session::AppState;
use crate::models::{
    attendee::Attendee,
    booth::Booth,
    registration::{CreateRegistrationData, SessionRegistration},
    session::Session,
};
use crate::services::email::{self, EmailTemplate};
use crate::services::offline_queue::QueuedAction;

#[derive(Debug)]
pub enum RegistrationError {
    DatabaseError(sqlx::Error),
    QueueError(sqlx::Error),
    NotFound(&'static str),
    ValidationError(String),
    SessionFull,
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            RegistrationError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            RegistrationError::QueueError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Local queue error: {}", e),
            ),
            RegistrationError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{} not found", what))
            }
            RegistrationError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            RegistrationError::SessionFull => {
                (StatusCode::CONFLICT, "Session is at capacity".to_string())
            }
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct BookParams {
    pub attendee_id: Uuid,
    pub expected_booth_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<SessionRegistration>,
    pub queued: bool,
}

/// Books an attendee into a session (a booth meeting when
/// `expected_booth_id` is set). Capacity is enforced here, at booking
/// time — the scan classifier never consults it.
async fn book(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(params): Json<BookParams>,
) -> Result<(StatusCode, Json<BookResponse>), RegistrationError> {
    let session = Session::find_by_id(&state.pool, session_id)
        .await
        .map_err(RegistrationError::DatabaseError)?
        .ok_or(RegistrationError::NotFound("Session"))?;

    let attendee = Attendee::find_by_id(&state.pool, params.attendee_id)
        .await
        .map_err(RegistrationError::DatabaseError)?
        .ok_or(RegistrationError::NotFound("Attendee"))?;

    if attendee.event_id != session.event_id {
        return Err(RegistrationError::ValidationError(
            "attendee belongs to a different event".to_string(),
        ));
    }

    if let Some(booth_id) = params.expected_booth_id {
        let booth = Booth::find_by_id(&state.pool, booth_id)
            .await
            .map_err(RegistrationError::DatabaseError)?
            .ok_or(RegistrationError::NotFound("Booth"))?;
        if booth.event_id != session.event_id {
            return Err(RegistrationError::ValidationError(
                "booth belongs to a different event".to_string(),
            ));
        }
    }

    if session.has_capacity {
        if let Some(max) = session.max_capacity {
            let booked = SessionRegistration::count_active_for_session(&state.pool, session.id)
                .await
                .map_err(RegistrationError::DatabaseError)?;
            if booked >= max as i64 {
                return Err(RegistrationError::SessionFull);
            }
        }
    }

    let data = CreateRegistrationData {
        attendee_id: attendee.id,
        session_id: session.id,
        event_id: session.event_id,
        expected_booth_id: params.expected_booth_id,
    };

    match SessionRegistration::create(&state.pool, data.clone()).await {
        Ok(registration) => {
            tracing::info!(
                registration_id = %registration.id,
                session_id = %session.id,
                "Meeting booked"
            );

            // Confirmation is best-effort; the outcome lands in email_logs.
            let _ = email::send_and_log(
                &state.pool,
                state.email.as_ref(),
                Some(session.event_id),
                &attendee.email,
                EmailTemplate::RegistrationConfirmation,
                serde_json::json!({
                    "full_name": attendee.full_name,
                    "session_title": session.title,
                    "starts_at": session.starts_at,
                }),
            )
            .await;

            Ok((
                StatusCode::CREATED,
                Json(BookResponse {
                    registration: Some(registration),
                    queued: false,
                }),
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration write failed, queueing");
            state
                .queue
                .enqueue(
                    &QueuedAction::Registration { registration: data },
                    Utc::now(),
                )
                .await
                .map_err(RegistrationError::QueueError)?;

            Ok((
                StatusCode::ACCEPTED,
                Json(BookResponse {
                    registration: None,
                    queued: true,
                }),
            ))
        }
    }
}

async fn list_for_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<SessionRegistration>>, RegistrationError> {
    let registrations = SessionRegistration::list_by_session(&state.pool, session_id)
        .await
        .map_err(RegistrationError::DatabaseError)?;

    Ok(Json(registrations))
}

/// Cancels a booking. Already-attended or already-cancelled registrations
/// are left untouched.
async fn cancel(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<StatusCode, RegistrationError> {
    SessionRegistration::find_by_id(&state.pool, registration_id)
        .await
        .map_err(RegistrationError::DatabaseError)?
        .ok_or(RegistrationError::NotFound("Registration"))?;

    let cancelled = SessionRegistration::cancel(&state.pool, registration_id)
        .await
        .map_err(RegistrationError::DatabaseError)?;

    if cancelled {
        tracing::info!(registration_id = %registration_id, "Booking cancelled");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RegistrationError::ValidationError(
            "registration is not in a cancellable state".to_string(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/sessions/:session_id/registrations",
            post(book).get(list_for_session),
        )
        .route("/api/registrations/:registration_id", delete(cancel))
}
