use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::session::{AppState, SESSION_KEY_ATTENDEE_ID, SESSION_KEY_EVENT_ID};
use crate::models::attendee::Attendee;
use crate::services::access_codes;

#[derive(Debug)]
pub enum AuthError {
    DatabaseError(sqlx::Error),
    SessionError(String),
    InvalidCode,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            AuthError::SessionError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session error: {}", msg),
            ),
            AuthError::InvalidCode => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired access code".to_string(),
            ),
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestCodeParams {
    pub event_id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RequestCodeResponse {
    pub message: String,
}

/// Issues a one-time login code and emails it to the attendee.
///
/// The response is identical whether or not the email is registered, so the
/// endpoint cannot be used to probe the attendee list.
async fn request_code(
    State(state): State<AppState>,
    Json(params): Json<RequestCodeParams>,
) -> Result<Json<RequestCodeResponse>, AuthError> {
    let attendee = Attendee::find_by_email(&state.pool, params.event_id, &params.email)
        .await
        .map_err(AuthError::DatabaseError)?;

    if let Some(attendee) = attendee {
        match access_codes::issue(&state.pool, state.email.as_ref(), &state.config, &attendee)
            .await
        {
            Ok(_) => {
                tracing::info!(attendee_id = %attendee.id, "Access code issued");
            }
            Err(e) => {
                // Delivery problems are logged (and recorded in email_logs)
                // but not surfaced, to keep the response uniform.
                tracing::error!(attendee_id = %attendee.id, error = %e, "Access code issue failed");
            }
        }
    }

    Ok(Json(RequestCodeResponse {
        message: "If that email is registered, a login code is on its way.".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeParams {
    pub event_id: Uuid,
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub attendee_id: Uuid,
    pub full_name: String,
}

/// Verifies an access code and logs the attendee into the portal session
async fn verify_code(
    State(state): State<AppState>,
    session: Session,
    Json(params): Json<VerifyCodeParams>,
) -> Result<Json<VerifyCodeResponse>, AuthError> {
    let attendee = Attendee::find_by_email(&state.pool, params.event_id, &params.email)
        .await
        .map_err(AuthError::DatabaseError)?
        .ok_or(AuthError::InvalidCode)?;

    let consumed = access_codes::verify(&state.pool, &attendee, &params.code)
        .await
        .map_err(|e| match e {
            access_codes::AccessCodeError::Database(e) => AuthError::DatabaseError(e),
            _ => AuthError::InvalidCode,
        })?;

    if consumed.is_none() {
        return Err(AuthError::InvalidCode);
    }

    session
        .insert(SESSION_KEY_ATTENDEE_ID, attendee.id)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;
    session
        .insert(SESSION_KEY_EVENT_ID, attendee.event_id)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    tracing::info!(attendee_id = %attendee.id, "Attendee logged in");

    Ok(Json(VerifyCodeResponse {
        attendee_id: attendee.id,
        full_name: attendee.full_name,
    }))
}

/// Ends the portal session
async fn logout(session: Session) -> Result<StatusCode, AuthError> {
    session
        .flush()
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/request-code", post(request_code))
        .route("/auth/verify-code", post(verify_code))
        .route("/auth/logout", post(logout))
}
