use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gatepass::services::email::{EmailClient, EmailError, EmailTemplate};

fn client_for(server: &MockServer) -> EmailClient {
    EmailClient::new(
        server.uri(),
        Some(Secret::new("secret-token".to_string())),
        "no-reply@gatepass.local".to_string(),
    )
}

#[tokio::test]
async fn send_posts_contract_and_returns_provider_message_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "from": "no-reply@gatepass.local",
            "to": "ada@example.com",
            "template": "access_code",
            "payload": { "code": "123456" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message_id": "msg-42",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client_for(&server)
        .send(
            "ada@example.com",
            EmailTemplate::AccessCode,
            json!({ "code": "123456" }),
        )
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.provider_message_id.as_deref(), Some("msg-42"));
}

#[tokio::test]
async fn provider_rejection_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message_id": null,
            "error": "unknown template",
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send(
            "ada@example.com",
            EmailTemplate::CheckInReceipt,
            json!({}),
        )
        .await;

    match result {
        Err(EmailError::Rejected(reason)) => assert_eq!(reason, "unknown template"),
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn provider_outage_is_a_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send(
            "ada@example.com",
            EmailTemplate::RegistrationConfirmation,
            json!({}),
        )
        .await;

    assert!(matches!(result, Err(EmailError::Request(_))));
}
