//! Integration tests against a real Redis instance via testcontainers.

use notify_common::{NotificationRecord, NotificationStatus, NotificationType};
use notify_store::Store;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::Redis;

async fn start_store() -> (testcontainers::ContainerAsync<Redis>, Store) {
    let container = Redis::default().start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped redis port");
    let store = Store::connect(&format!("redis://127.0.0.1:{port}"))
        .await
        .expect("connect to redis");
    (container, store)
}

fn sample_record(id: &str) -> NotificationRecord {
    NotificationRecord {
        notification_id: id.to_string(),
        user_id: "u1".to_string(),
        notification_type: NotificationType::Email,
        status: NotificationStatus::Pending,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        request_id: "r1".to_string(),
        error: None,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn reserve_request_is_idempotent_under_the_same_request_id() {
    let (_container, store) = start_store().await;

    let first = store.reserve_request("req-1", "notif-1", 60).await.unwrap();
    assert!(first.is_none());

    let second = store.reserve_request("req-1", "notif-2", 60).await.unwrap();
    assert_eq!(second, Some("notif-1".to_string()));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn notification_status_updates_round_trip() {
    let (_container, store) = start_store().await;

    let record = sample_record("notif-1");
    store.put_notification(&record, 60).await.unwrap();

    store
        .update_notification_status("notif-1", NotificationStatus::Delivered, None, 60)
        .await
        .unwrap();

    let updated = store.get_notification("notif-1").await.unwrap().unwrap();
    assert_eq!(updated.status, NotificationStatus::Delivered);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn rate_limit_blocks_once_quota_is_exhausted() {
    let (_container, store) = start_store().await;

    for _ in 0..3 {
        let (allowed, _) = store.check_rate_limit("client-1", 3).await;
        assert!(allowed);
    }

    let (allowed, retry_after) = store.check_rate_limit("client-1", 3).await;
    assert!(!allowed);
    assert!(retry_after > 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn worker_idempotency_marker_is_observable_after_write() {
    let (_container, store) = start_store().await;

    assert!(!store.is_worker_processed("email", "req-1").await.unwrap());
    store.mark_worker_processed("email", "req-1", "delivered", 60).await.unwrap();
    assert!(store.is_worker_processed("email", "req-1").await.unwrap());
}
