use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Offline queue (SQLite file path, e.g. "data/queue.db")
    pub queue_path: String,

    // Email delivery provider
    pub email_api_url: Option<String>,
    pub email_api_token: Option<Secret<String>>,
    pub email_from: String,

    // Sync policy
    pub sync_interval_secs: u64,
    pub sync_max_attempts: i32,
    pub sync_backoff_base_secs: i64,

    // Access codes
    pub access_code_ttl_minutes: i64,

    // Security
    pub badge_signing_key: Secret<String>,
    pub session_secret: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            queue_path: config
                .get("queue_path")
                .unwrap_or_else(|_| "data/queue.db".to_string()),

            email_api_url: config.get("email_api_url").ok(),
            email_api_token: config
                .get::<String>("email_api_token")
                .ok()
                .map(Secret::new),
            email_from: config
                .get("email_from")
                .unwrap_or_else(|_| "no-reply@gatepass.local".to_string()),

            sync_interval_secs: config.get("sync_interval_secs").unwrap_or(60),
            sync_max_attempts: config.get("sync_max_attempts").unwrap_or(8),
            sync_backoff_base_secs: config.get("sync_backoff_base_secs").unwrap_or(30),

            access_code_ttl_minutes: config.get("access_code_ttl_minutes").unwrap_or(15),

            badge_signing_key: Secret::new(config.get("badge_signing_key")?),
            session_secret: Secret::new(config.get("session_secret")?),
        })
    }
}
