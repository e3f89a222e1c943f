use notify_providers::{EmailProvider, FcmPushProvider, PushProvider, SendGridEmailProvider};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sendgrid_accepts_a_successful_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = SendGridEmailProvider::with_base_url("test-key", "from@example.com", mock_server.uri());
    let result = provider.send("to@example.com", "Hi", "body").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn sendgrid_classifies_server_error_as_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let provider = SendGridEmailProvider::with_base_url("test-key", "from@example.com", mock_server.uri());
    let err = provider.send("to@example.com", "Hi", "body").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn sendgrid_classifies_bad_request_as_terminal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let provider = SendGridEmailProvider::with_base_url("test-key", "from@example.com", mock_server.uri());
    let err = provider.send("to@example.com", "Hi", "body").await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fcm_classifies_unregistered_token_as_terminal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": 0,
            "failure": 1,
            "results": [{"error": "NotRegistered"}]
        })))
        .mount(&mock_server)
        .await;

    let provider = FcmPushProvider::with_base_url("test-key", mock_server.uri());
    let err = provider.send("device-1", "Hi", "body").await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fcm_classifies_unavailable_as_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": 0,
            "failure": 1,
            "results": [{"error": "Unavailable"}]
        })))
        .mount(&mock_server)
        .await;

    let provider = FcmPushProvider::with_base_url("test-key", mock_server.uri());
    let err = provider.send("device-1", "Hi", "body").await.unwrap_err();
    assert!(err.is_retryable());
}
