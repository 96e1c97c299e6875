use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::session::AppState;
use crate::services::sync::{SyncOutcome, SyncState, SyncStats};

#[derive(Debug)]
pub enum SyncApiError {
    QueueError(sqlx::Error),
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> axum::response::Response {
        let SyncApiError::QueueError(e) = self;
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Local queue error: {}", e),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub state: SyncState,
    pub pending: i64,
}

/// Pending-action count and reconciler state, for the UI indicator
async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, SyncApiError> {
    let pending = state
        .reconciler
        .pending_count()
        .await
        .map_err(SyncApiError::QueueError)?;

    Ok(Json(SyncStatusResponse {
        state: state.reconciler.state(),
        pending,
    }))
}

#[derive(Debug, Serialize)]
pub struct SyncNowResponse {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
}

/// Manual "sync now". A request while a sync is already in flight is a
/// no-op, reported as such.
async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncNowResponse>, SyncApiError> {
    match state
        .reconciler
        .sync_now()
        .await
        .map_err(SyncApiError::QueueError)?
    {
        SyncOutcome::Completed(stats) => Ok(Json(SyncNowResponse {
            state: "completed".to_string(),
            stats: Some(stats),
        })),
        SyncOutcome::AlreadyRunning => Ok(Json(SyncNowResponse {
            state: "already_running".to_string(),
            stats: None,
        })),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sync/status", get(sync_status))
        .route("/api/sync/now", post(sync_now))
}
