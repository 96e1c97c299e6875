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

use crate::api::middleware::session::AppState;
use crate::models::{attendee::Attendee, booth::Booth, scan::ScanRecord};
use crate::services::offline_queue::QueuedAction;
use crate::services::qr_generator::SignedBadge;
use crate::services::scan_classifier::{self, PersistOutcome};

#[derive(Debug)]
pub enum ScanApiError {
    DatabaseError(sqlx::Error),
    QueueError(sqlx::Error),
    BoothNotFound,
    AttendeeNotFound,
    InvalidBadge,
    ValidationError(String),
}

impl IntoResponse for ScanApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ScanApiError::DatabaseError(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Remote store unavailable: {}", e),
            ),
            ScanApiError::QueueError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Local queue error: {}", e),
            ),
            ScanApiError::BoothNotFound => {
                (StatusCode::NOT_FOUND, "Booth not found".to_string())
            }
            ScanApiError::AttendeeNotFound => {
                (StatusCode::NOT_FOUND, "Attendee not found".to_string())
            }
            ScanApiError::InvalidBadge => (
                StatusCode::BAD_REQUEST,
                "Badge payload is malformed or its signature is invalid".to_string(),
            ),
            ScanApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitScanParams {
    /// Raw signed badge payload as decoded from the QR code
    pub badge: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitScanResponse {
    pub attendee_id: Uuid,
    pub scan_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub attended_marked: bool,
    /// True when the remote write failed and the scan was spooled into the
    /// offline queue for later replay.
    pub queued: bool,
}

/// Classifies and records a badge scan at a booth.
///
/// The badge signature is checked before anything else; classification then
/// runs against the sessions active at this booth and the attendee's
/// registrations. A failed remote write degrades to the offline queue
/// instead of losing the scan.
async fn submit_scan(
    State(state): State<AppState>,
    Path(booth_id): Path<Uuid>,
    Json(params): Json<SubmitScanParams>,
) -> Result<(StatusCode, Json<SubmitScanResponse>), ScanApiError> {
    let booth = Booth::find_by_id(&state.pool, booth_id)
        .await
        .map_err(ScanApiError::DatabaseError)?
        .ok_or(ScanApiError::BoothNotFound)?;

    let key = state.config.badge_signing_key.expose_secret().as_bytes();
    let badge = SignedBadge::parse_and_verify(&params.badge, key)
        .ok_or(ScanApiError::InvalidBadge)?;

    if badge.event_id != booth.event_id {
        return Err(ScanApiError::ValidationError(
            "badge was issued for a different event".to_string(),
        ));
    }

    let attendee = Attendee::find_by_id(&state.pool, badge.attendee_id)
        .await
        .map_err(ScanApiError::DatabaseError)?
        .ok_or(ScanApiError::AttendeeNotFound)?;

    let recorded = scan_classifier::record_scan(
        &state.pool,
        booth.event_id,
        attendee.id,
        booth.id,
        Utc::now(),
    )
    .await
    .map_err(ScanApiError::DatabaseError)?;

    let (queued, attended_marked) = match recorded.outcome {
        PersistOutcome::Stored {
            attended_marked, ..
        } => (false, attended_marked),
        PersistOutcome::Deferred {
            scan,
            mark_attended,
            ..
        } => {
            let scanned_at = scan.scanned_at;
            state
                .queue
                .enqueue(
                    &QueuedAction::Scan {
                        scan,
                        mark_attended,
                    },
                    scanned_at,
                )
                .await
                .map_err(ScanApiError::QueueError)?;
            (true, false)
        }
    };

    let status_code = if queued {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((
        status_code,
        Json(SubmitScanResponse {
            attendee_id: attendee.id,
            scan_status: recorded.classification.status().to_string(),
            session_id: recorded.classification.session_id(),
            attended_marked,
            queued,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScanHistoryResponse {
    pub scans: Vec<ScanRecord>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Scan history for an event, newest first
async fn scan_history(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ScanHistoryResponse>, ScanApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 500);
    let offset = (page - 1) * per_page;

    let scans = ScanRecord::list_by_event(&state.pool, event_id, per_page, offset)
        .await
        .map_err(ScanApiError::DatabaseError)?;

    let total = ScanRecord::count_by_event_and_status(&state.pool, event_id, None)
        .await
        .map_err(ScanApiError::DatabaseError)?;

    Ok(Json(ScanHistoryResponse {
        scans,
        page,
        per_page,
        total,
    }))
}

#[derive(Debug, Serialize)]
pub struct ScanSummaryResponse {
    pub total: i64,
    pub expected: i64,
    pub walk_in: i64,
    pub wrong_booth: i64,
    pub out_of_schedule: i64,
    pub regular: i64,
    pub unique_attendees: i64,
    pub checked_in_attendees: i64,
}

/// Per-status scan counts for an event's dashboard
async fn scan_summary(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<ScanSummaryResponse>, ScanApiError> {
    let pool = &state.pool;

    let total = ScanRecord::count_by_event_and_status(pool, event_id, None)
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let expected = ScanRecord::count_by_event_and_status(pool, event_id, Some("expected"))
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let walk_in = ScanRecord::count_by_event_and_status(pool, event_id, Some("walk_in"))
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let wrong_booth = ScanRecord::count_by_event_and_status(pool, event_id, Some("wrong_booth"))
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let out_of_schedule =
        ScanRecord::count_by_event_and_status(pool, event_id, Some("out_of_schedule"))
            .await
            .map_err(ScanApiError::DatabaseError)?;
    let regular = ScanRecord::count_by_event_and_status(pool, event_id, Some("regular"))
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let unique_attendees = ScanRecord::count_unique_attendees(pool, event_id)
        .await
        .map_err(ScanApiError::DatabaseError)?;
    let checked_in_attendees = Attendee::count_checked_in(pool, event_id)
        .await
        .map_err(ScanApiError::DatabaseError)?;

    Ok(Json(ScanSummaryResponse {
        total,
        expected,
        walk_in,
        wrong_booth,
        out_of_schedule,
        regular,
        unique_attendees,
        checked_in_attendees,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/booths/:booth_id/scans", post(submit_scan))
        .route("/api/events/:event_id/scans", get(scan_history))
        .route("/api/events/:event_id/scans/summary", get(scan_summary))
}
