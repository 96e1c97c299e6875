use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use super::session::SESSION_KEY_ATTENDEE_ID;

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    SessionError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.",
            )
                .into_response(),
            AuthError::SessionError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
        }
    }
}

/// Middleware that requires an attendee to be logged in
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let attendee_id: Option<Uuid> = session
        .get(SESSION_KEY_ATTENDEE_ID)
        .await
        .map_err(|_| AuthError::SessionError)?;

    if attendee_id.is_none() {
        return Err(AuthError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// The attendee identity stored in the portal session
#[derive(Debug, Clone)]
pub struct AuthenticatedAttendee {
    pub attendee_id: Uuid,
}

/// Extracts the logged-in attendee from the session
pub async fn get_authenticated_attendee(
    session: &Session,
) -> Result<AuthenticatedAttendee, AuthError> {
    let attendee_id: Uuid = session
        .get(SESSION_KEY_ATTENDEE_ID)
        .await
        .map_err(|_| AuthError::SessionError)?
        .ok_or(AuthError::Unauthorized)?;

    Ok(AuthenticatedAttendee { attendee_id })
}
