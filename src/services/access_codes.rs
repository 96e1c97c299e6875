use ring::rand::{SecureRandom, SystemRandom};
use sqlx::PgPool;

use crate::config::Config;
use crate::models::access_code::AccessCode;
use crate::models::attendee::Attendee;
use crate::services::email::{self, EmailClient, EmailTemplate};

#[derive(thiserror::Error, Debug)]
pub enum AccessCodeError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email delivery failed: {0}")]
    Email(#[from] email::EmailError),

    #[error("Random generator failure")]
    Rng,
}

/// Generates a six-digit one-time code
pub fn generate_code() -> Result<String, AccessCodeError> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; 4];
    rng.fill(&mut buf).map_err(|_| AccessCodeError::Rng)?;

    let n = u32::from_be_bytes(buf) % 1_000_000;
    Ok(format!("{:06}", n))
}

/// Issues a fresh access code for an attendee and emails it.
///
/// Outstanding codes are invalidated first so only the newest one logs in;
/// the code row is committed before the email goes out, so a resend after a
/// delivery failure issues a new code rather than resurrecting the old one.
#[tracing::instrument(skip(pool, email_client, config))]
pub async fn issue(
    pool: &PgPool,
    email_client: Option<&EmailClient>,
    config: &Config,
    attendee: &Attendee,
) -> Result<AccessCode, AccessCodeError> {
    AccessCode::invalidate_outstanding(pool, attendee.id).await?;

    let code = generate_code()?;
    let access_code =
        AccessCode::create(pool, attendee.id, &code, config.access_code_ttl_minutes).await?;

    email::send_and_log(
        pool,
        email_client,
        Some(attendee.event_id),
        &attendee.email,
        EmailTemplate::AccessCode,
        serde_json::json!({
            "full_name": attendee.full_name,
            "code": code,
            "expires_at": access_code.expires_at,
        }),
    )
    .await?;

    Ok(access_code)
}

/// Consumes a code for an attendee; `None` means expired, used, or unknown.
pub async fn verify(
    pool: &PgPool,
    attendee: &Attendee,
    code: &str,
) -> Result<Option<AccessCode>, AccessCodeError> {
    let consumed = AccessCode::consume(pool, attendee.id, code).await?;

    if consumed.is_some() {
        tracing::info!(attendee_id = %attendee.id, "Access code accepted");
    } else {
        tracing::warn!(attendee_id = %attendee.id, "Access code rejected");
    }

    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..32 {
            let code = generate_code().unwrap();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
