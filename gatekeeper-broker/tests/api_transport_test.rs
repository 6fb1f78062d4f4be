//! Transactional API transport against a mock HTTP server

use std::sync::Arc;

use gatekeeper_broker::{
    spawn_transport_chain, ApiConfig, DeliveryKind, DeliveryReceipt, FallbackTransport,
    InMemoryStore, MailConfig, MailTransport, QueuedDocumentTransport, TransactionalApiTransport,
    TransportError, TransportKind,
};
use gatekeeper_core::{OutboundMessage, Priority, SenderIdentity};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "xkeysib-test";

fn message() -> OutboundMessage {
    OutboundMessage {
        to: "boss@acme.io".to_string(),
        from: SenderIdentity::for_site("Acme", None, "mailer.invalid"),
        reply_to: "acme@mailer.invalid".to_string(),
        subject: "Acme administrator approval".to_string(),
        html: "<p>approve</p>".to_string(),
        text: "approve".to_string(),
        priority: Priority::High,
    }
}

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        api_key: API_KEY.to_string(),
        url: format!("{}/v3/smtp/email", server.uri()),
    }
}

fn api_transport(config: ApiConfig) -> TransactionalApiTransport {
    TransactionalApiTransport::new(config).unwrap()
}

/// Build and use the transport off the async workers, like the handlers do
async fn send_blocking<T, F>(build: F) -> Result<DeliveryReceipt, TransportError>
where
    T: MailTransport + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || build().send(&message()))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_send_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/smtp/email"))
        .and(header("api-key", API_KEY))
        .and(body_partial_json(json!({
            "sender": { "email": "acme@mailer.invalid", "name": "Acme" },
            "to": [{ "email": "boss@acme.io" }],
            "subject": "Acme administrator approval",
            "headers": { "X-Priority": "1" },
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "messageId": "<42@relay>" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = api_config(&server);
    let receipt = send_blocking(move || api_transport(config)).await.unwrap();

    assert_eq!(receipt.message_id, "<42@relay>");
    assert_eq!(receipt.transport, "api");
    assert_eq!(receipt.sent_via, DeliveryKind::Direct);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_rejected_key_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "code": "unauthorized" })))
        .mount(&server)
        .await;

    let config = api_config(&server);
    let err = send_blocking(move || api_transport(config)).await.unwrap_err();

    assert!(matches!(err, TransportError::AuthenticationFailed { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_api_server_error_is_delivery_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = api_config(&server);
    let err = send_blocking(move || api_transport(config)).await.unwrap_err();

    assert!(matches!(err, TransportError::DeliveryFailed { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fallback_to_queue_after_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let config = api_config(&server);
    let queue_store = store.clone();
    let receipt = send_blocking(move || {
        FallbackTransport::new()
            .with(Box::new(api_transport(config)))
            .with(Box::new(QueuedDocumentTransport::new(queue_store)))
    })
    .await
    .unwrap();

    assert_eq!(receipt.transport, "queue");
    assert_eq!(receipt.sent_via, DeliveryKind::Queued);
    assert_eq!(store.queued_mail().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chain_with_api_key_builds_inside_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("api-key", API_KEY))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "messageId": "<7@relay>" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = MailConfig {
        priority: vec![TransportKind::Api, TransportKind::Queue],
        smtp: None,
        api: Some(api_config(&server)),
        smtp_disabled: false,
        api_disabled: false,
        queue_enabled: true,
        console_enabled: false,
    };

    let chain = spawn_transport_chain(config, Arc::new(InMemoryStore::new()))
        .await
        .unwrap();
    assert_eq!(chain.names(), vec!["api", "queue"]);

    let receipt = tokio::task::spawn_blocking(move || chain.send(&message()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(receipt.message_id, "<7@relay>");
    assert_eq!(receipt.transport, "api");
}
