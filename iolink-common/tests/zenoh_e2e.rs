//! End-to-end tests with Zenoh pub/sub.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique key prefix to avoid interference.

use std::time::Duration;

use iolink_common::{ZenohConfig, connect, connect_with_retry};

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

fn isolated_config() -> ZenohConfig {
    ZenohConfig {
        multicast_scouting: false,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_and_pubsub_json() {
    let prefix = unique_prefix();
    let session = connect(&isolated_config())
        .await
        .expect("Failed to open Zenoh session");

    let subscriber = session
        .declare_subscriber(format!("{}/**", prefix))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let payload = serde_json::json!({ "code": "event", "correlation_id": 123 });
    session
        .put(format!("{}/instrument/htr_a", prefix), payload.to_string())
        .await
        .expect("Failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive message");

    let bytes = received.payload().to_bytes();
    let decoded: serde_json::Value = serde_json::from_slice(&bytes).expect("Invalid JSON");
    assert_eq!(decoded["correlation_id"], 123);
    assert_eq!(
        received.key_expr().as_str(),
        format!("{}/instrument/htr_a", prefix)
    );

    drop(subscriber);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_with_retry_succeeds_first_time() {
    let session = connect_with_retry(&isolated_config())
        .await
        .expect("Failed to open Zenoh session");
    session.close().await.expect("Failed to close session");
}
