use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::services::email::EmailClient;
use crate::services::offline_queue::OfflineQueue;
use crate::services::sync::{PgRemote, SyncReconciler};

/// Session keys used in the application
pub const SESSION_KEY_ATTENDEE_ID: &str = "attendee_id";
pub const SESSION_KEY_EVENT_ID: &str = "event_id";

/// Creates a session layer for Axum
pub async fn create_session_layer(
    pool: PgPool,
    base_url: &str,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    // Create the session store backed by PostgreSQL
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    // Secure cookies only make sense when the site is served over HTTPS.
    let secure = base_url.starts_with("https://");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)));

    Ok(session_layer)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub email: Option<EmailClient>,
    pub queue: OfflineQueue,
    pub reconciler: Arc<SyncReconciler<PgRemote>>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}
