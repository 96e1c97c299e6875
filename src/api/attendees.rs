use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tower_sessions::Session;

use crate::api::middleware::auth::get_authenticated_attendee;
use crate::api::middleware::session::AppState;
use crate::models::{
    attendee::{Attendee, CreateAttendeeData},
    event::Event,
    registration::SessionRegistration,
    scan::{CreateScanData, ScanRecord},
};
use crate::services::offline_queue::QueuedAction;
use crate::services::qr_generator::{self, BadgePayload, QrGenerationError};
use crate::services::scan_classifier;

#[derive(Debug)]
pub enum AttendeeError {
    DatabaseError(sqlx::Error),
    QueueError(sqlx::Error),
    NotFound,
    Unauthorized,
    ValidationError(String),
    BadgeError(QrGenerationError),
}

impl IntoResponse for AttendeeError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AttendeeError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            AttendeeError::QueueError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Local queue error: {}", e),
            ),
            AttendeeError::NotFound => (StatusCode::NOT_FOUND, "Attendee not found".to_string()),
            AttendeeError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.".to_string(),
            ),
            AttendeeError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AttendeeError::BadgeError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Badge generation error: {}", e),
            ),
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAttendeeParams {
    pub full_name: String,
    pub email: String,
    pub company: Option<String>,
}

async fn create_attendee(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(params): Json<CreateAttendeeParams>,
) -> Result<(StatusCode, Json<Attendee>), AttendeeError> {
    if params.email.trim().is_empty() || !params.email.contains('@') {
        return Err(AttendeeError::ValidationError(
            "a valid email address is required".to_string(),
        ));
    }
    if params.full_name.trim().is_empty() {
        return Err(AttendeeError::ValidationError(
            "full_name is required".to_string(),
        ));
    }

    Event::find_by_id(&state.pool, event_id)
        .await
        .map_err(AttendeeError::DatabaseError)?
        .ok_or(AttendeeError::NotFound)?;

    let attendee = Attendee::create(
        &state.pool,
        CreateAttendeeData {
            event_id,
            full_name: params.full_name,
            email: params.email,
            company: params.company,
        },
    )
    .await
    .map_err(AttendeeError::DatabaseError)?;

    tracing::info!(attendee_id = %attendee.id, event_id = %event_id, "Attendee registered");

    Ok((StatusCode::CREATED, Json(attendee)))
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

async fn list_attendees(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<Attendee>>, AttendeeError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 500);
    let offset = (page - 1) * per_page;

    let attendees = Attendee::list_by_event(&state.pool, event_id, per_page, offset)
        .await
        .map_err(AttendeeError::DatabaseError)?;

    Ok(Json(attendees))
}

#[derive(Debug, Serialize)]
pub struct BadgeResponse {
    pub attendee_id: Uuid,
    pub full_name: String,
    pub qr_svg: String,
    pub qr_png_base64: String,
}

/// Renders the attendee's signed badge QR code
async fn get_badge(
    State(state): State<AppState>,
    Path(attendee_id): Path<Uuid>,
) -> Result<Json<BadgeResponse>, AttendeeError> {
    let attendee = Attendee::find_by_id(&state.pool, attendee_id)
        .await
        .map_err(AttendeeError::DatabaseError)?
        .ok_or(AttendeeError::NotFound)?;

    let key = state.config.badge_signing_key.expose_secret().as_bytes();
    let badge = BadgePayload::new(attendee.id, attendee.event_id, attendee.full_name.clone())
        .sign(key)
        .map_err(AttendeeError::BadgeError)?;

    let qr_svg = qr_generator::generate_qr_svg(&badge).map_err(AttendeeError::BadgeError)?;
    let png = qr_generator::generate_qr_png(&badge).map_err(AttendeeError::BadgeError)?;

    use base64::Engine;
    let qr_png_base64 = base64::engine::general_purpose::STANDARD.encode(png);

    Ok(Json(BadgeResponse {
        attendee_id: attendee.id,
        full_name: attendee.full_name,
        qr_svg,
        qr_png_base64,
    }))
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub attendee_id: Uuid,
    pub checked_in: bool,
    pub queued: bool,
}

/// Entrance check-in: stamps `checked_in_at` and appends a `regular` scan.
///
/// If the remote store is unreachable the writes are spooled into the
/// offline queue and replayed by the reconciler.
async fn check_in(
    State(state): State<AppState>,
    Path(attendee_id): Path<Uuid>,
) -> Result<Json<CheckInResponse>, AttendeeError> {
    let attendee = Attendee::find_by_id(&state.pool, attendee_id)
        .await
        .map_err(AttendeeError::DatabaseError)?
        .ok_or(AttendeeError::NotFound)?;

    let now = Utc::now();
    let scan = CreateScanData {
        event_id: attendee.event_id,
        attendee_id: attendee.id,
        booth_id: None,
        session_id: None,
        expected_booth_id: None,
        scanned_at: now,
        scan_status: scan_classifier::REGULAR_STATUS.to_string(),
        notes: None,
    };

    match Attendee::set_checked_in(&state.pool, attendee.id, now).await {
        Ok(newly_checked_in) => {
            // The entrance scan is best-effort on top of the check-in stamp.
            if let Err(e) = ScanRecord::create(&state.pool, scan.clone()).await {
                tracing::warn!(error = %e, "Entrance scan write failed, queueing");
                state
                    .queue
                    .enqueue(
                        &QueuedAction::Scan {
                            scan,
                            mark_attended: None,
                        },
                        now,
                    )
                    .await
                    .map_err(AttendeeError::QueueError)?;
                return Ok(Json(CheckInResponse {
                    attendee_id: attendee.id,
                    checked_in: newly_checked_in,
                    queued: true,
                }));
            }

            Ok(Json(CheckInResponse {
                attendee_id: attendee.id,
                checked_in: newly_checked_in,
                queued: false,
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Check-in write failed, queueing");
            state
                .queue
                .enqueue(
                    &QueuedAction::CheckIn {
                        attendee_id: attendee.id,
                        event_id: attendee.event_id,
                        checked_in_at: now,
                    },
                    now,
                )
                .await
                .map_err(AttendeeError::QueueError)?;
            state
                .queue
                .enqueue(
                    &QueuedAction::Scan {
                        scan,
                        mark_attended: None,
                    },
                    now,
                )
                .await
                .map_err(AttendeeError::QueueError)?;

            Ok(Json(CheckInResponse {
                attendee_id: attendee.id,
                checked_in: false,
                queued: true,
            }))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub attendee: Attendee,
    pub registrations: Vec<SessionRegistration>,
    pub scans: Vec<ScanRecord>,
}

/// The logged-in attendee's portal view: profile, bookings, scan trail
async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<MeResponse>, AttendeeError> {
    let auth = get_authenticated_attendee(&session)
        .await
        .map_err(|_| AttendeeError::Unauthorized)?;

    let attendee = Attendee::find_by_id(&state.pool, auth.attendee_id)
        .await
        .map_err(AttendeeError::DatabaseError)?
        .ok_or(AttendeeError::NotFound)?;

    let registrations = SessionRegistration::list_active_for_attendee(&state.pool, attendee.id)
        .await
        .map_err(AttendeeError::DatabaseError)?;

    let scans = ScanRecord::list_by_attendee(&state.pool, attendee.id)
        .await
        .map_err(AttendeeError::DatabaseError)?;

    Ok(Json(MeResponse {
        attendee,
        registrations,
        scans,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/events/:event_id/attendees",
            post(create_attendee).get(list_attendees),
        )
        .route("/api/attendees/:attendee_id/badge", get(get_badge))
        .route("/api/attendees/:attendee_id/check-in", post(check_in))
        .route("/api/me", get(me))
}
