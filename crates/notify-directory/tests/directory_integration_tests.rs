//! Exercises the cache-then-breaker-then-fetch path against a real Redis
//! instance and a mocked directory HTTP service.

use std::sync::Arc;
use std::time::Duration;

use notify_breaker::CircuitBreaker;
use notify_directory::UserDirectoryClient;
use notify_store::Store;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::Redis;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_store() -> (testcontainers::ContainerAsync<Redis>, Store) {
    let container = Redis::default().start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped redis port");
    let store = Store::connect(&format!("redis://127.0.0.1:{port}"))
        .await
        .expect("connect to redis");
    (container, store)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn fetches_once_then_serves_from_cache() {
    let (_container, store) = start_store().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "email": "ada@example.com",
                "push_token": null,
                "preferences": {"email": true, "push": true}
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let breaker = Arc::new(CircuitBreaker::default());
    let client = UserDirectoryClient::new(mock_server.uri(), Duration::from_secs(5), store, breaker).unwrap();

    let first = client.get_user("u1").await.unwrap();
    assert_eq!(first.email.as_deref(), Some("ada@example.com"));

    let second = client.get_user("u1").await.unwrap();
    assert_eq!(second.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn breaker_opens_after_repeated_failures() {
    let (_container, store) = start_store().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/u1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let breaker = Arc::new(CircuitBreaker::new(2, 1, Duration::from_secs(30)));
    let client = UserDirectoryClient::new(mock_server.uri(), Duration::from_secs(5), store, breaker.clone()).unwrap();

    assert!(client.get_user("u1").await.is_err());
    assert!(client.get_user("u1").await.is_err());
    assert_eq!(breaker.state(), notify_breaker::CircuitState::Open);

    let result = client.get_user("u1").await;
    assert!(matches!(result, Err(notify_directory::DirectoryError::CircuitOpen)));
}
