use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::models::email_log::{CreateEmailLogData, EmailLog};

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("Email provider not configured")]
    NotConfigured,

    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    AccessCode,
    RegistrationConfirmation,
    CheckInReceipt,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::AccessCode => "access_code",
            EmailTemplate::RegistrationConfirmation => "registration_confirmation",
            EmailTemplate::CheckInReceipt => "check_in_receipt",
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    template: &'a str,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    message_id: Option<String>,
    error: Option<String>,
}

/// Outcome of one delivery attempt, as reported by the provider.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
}

/// Thin client for the hosted email delivery provider.
///
/// The provider exposes a single `send` contract; template rendering and
/// delivery internals live on its side.
#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_url: String,
    api_token: Option<Secret<String>>,
    from: String,
}

impl EmailClient {
    /// Builds a client from configuration; `None` when no provider is
    /// configured (sends then fail with `NotConfigured`).
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_url = config.email_api_url.clone()?;

        Some(Self {
            http: reqwest::Client::new(),
            api_url,
            api_token: config.email_api_token.clone(),
            from: config.email_from.clone(),
        })
    }

    pub fn new(api_url: String, api_token: Option<Secret<String>>, from: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_token,
            from,
        }
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn send(
        &self,
        recipient: &str,
        template: EmailTemplate,
        payload: serde_json::Value,
    ) -> Result<SendOutcome, EmailError> {
        let url = format!("{}/send", self.api_url.trim_end_matches('/'));

        let mut request = self.http.post(&url).json(&SendRequest {
            from: &self.from,
            to: recipient,
            template: template.as_str(),
            payload,
        });

        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?.error_for_status()?;
        let body: SendResponse = response.json().await?;

        if !body.success {
            return Err(EmailError::Rejected(
                body.error.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        tracing::info!(
            template = template.as_str(),
            provider_message_id = ?body.message_id,
            "Email accepted by provider"
        );

        Ok(SendOutcome {
            success: true,
            provider_message_id: body.message_id,
        })
    }
}

/// Sends through the provider and records the attempt in the delivery log,
/// success or failure.
pub async fn send_and_log(
    pool: &PgPool,
    client: Option<&EmailClient>,
    event_id: Option<Uuid>,
    recipient: &str,
    template: EmailTemplate,
    payload: serde_json::Value,
) -> Result<SendOutcome, EmailError> {
    let result = match client {
        Some(client) => client.send(recipient, template, payload).await,
        None => Err(EmailError::NotConfigured),
    };

    let log = match &result {
        Ok(outcome) => CreateEmailLogData {
            event_id,
            recipient: recipient.to_string(),
            template: template.as_str().to_string(),
            provider_message_id: outcome.provider_message_id.clone(),
            status: "sent".to_string(),
            error: None,
        },
        Err(e) => CreateEmailLogData {
            event_id,
            recipient: recipient.to_string(),
            template: template.as_str().to_string(),
            provider_message_id: None,
            status: "failed".to_string(),
            error: Some(e.to_string()),
        },
    };

    if let Err(e) = EmailLog::create(pool, log).await {
        tracing::error!(error = %e, "Failed to record email delivery log");
    }

    result
}
