//! End-to-end tests: fake master -> poller -> Zenoh, and Zenoh -> command intake -> fake master.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique key prefix to avoid interference.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeMaster, Reply, isolated_zenoh, local_config, unique_prefix};
use iolink_bridge::api::BridgeApi;
use iolink_bridge::commands::{CommandIntake, result_key};
use iolink_bridge::context::{BridgeContext, BridgeSetup};
use iolink_bridge::events::EventEnvelope;
use iolink_bridge::poller::CycleOutcome;
use iolink_bridge::relay::{RelayResult, RelayStatus};
use iolink_bridge_framework::Publisher;

async fn setup(prefix: &str, master: &FakeMaster) -> (Arc<zenoh::Session>, BridgeSetup) {
    let session = Arc::new(
        iolink_common::connect(&isolated_zenoh())
            .await
            .expect("Failed to open Zenoh session"),
    );
    let publisher = Publisher::new(session.clone(), prefix);
    let setup = BridgeContext::build(publisher, local_config(prefix, master.port()))
        .expect("Failed to build context");
    (session, setup)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poll_publishes_on_every_channel() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;

    let subscriber = session
        .declare_subscriber(format!("{}/**", prefix))
        .await
        .expect("Failed to create subscriber");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let outcome = setup.pollers[0].poll_cycle().await;
    let CycleOutcome::Published(reading) = outcome else {
        panic!("expected a reading, got {:?}", outcome);
    };
    assert_eq!(reading.value, 20.0);
    assert_eq!(reading.raw, "0x00C8");

    let mut received: HashMap<String, Vec<EventEnvelope>> = HashMap::new();
    for _ in 0..6 {
        let sample = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
            .await
            .expect("Timeout waiting for event")
            .expect("Failed to receive event");
        let envelope: EventEnvelope =
            serde_json::from_slice(&sample.payload().to_bytes()).expect("Invalid envelope");
        received
            .entry(sample.key_expr().as_str().to_string())
            .or_default()
            .push(envelope);
    }

    for channel in [
        format!("{}/instruments_ti", prefix),
        format!("{}/instrument/htr_a", prefix),
        format!("{}/instrument/unit1/htr_a/temperature", prefix),
    ] {
        let envelopes = received.get(&channel).expect("channel missing");
        assert_eq!(envelopes.len(), 2, "{channel}");
        assert!(envelopes.iter().any(|e| {
            e.address == "/processdatamaster/temperature"
                && e.value() == Some(&serde_json::json!(20.0))
        }));
        assert!(envelopes.iter().any(|e| {
            e.address == "/iolinkmaster/port[6]/iolinkdevice/pdin"
                && e.value() == Some(&serde_json::json!("0x00C8"))
        }));
    }

    assert_eq!(
        setup.context.cache().latest("htr_a").map(|r| r.value),
        Some(20.0)
    );

    let requests = master.requests();
    assert_eq!(
        requests[0].path,
        "/iolinkmaster/port[6]/iolinkdevice/pdin/getdata"
    );

    drop(subscriber);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_counting_and_recovery() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;
    let poller = &setup.pollers[0];
    let cache = setup.context.cache();

    master.set_reply(Reply::Ok("0x0190".to_string()));
    assert!(matches!(poller.poll_cycle().await, CycleOutcome::Published(_)));

    master.set_reply(Reply::Status(500));
    assert_eq!(
        poller.poll_cycle().await,
        CycleOutcome::NetworkError {
            consecutive_errors: 1
        }
    );
    assert_eq!(
        poller.poll_cycle().await,
        CycleOutcome::NetworkError {
            consecutive_errors: 2
        }
    );

    // Protocol errors leave the counter alone.
    master.set_reply(Reply::Ok("not-hex".to_string()));
    assert_eq!(poller.poll_cycle().await, CycleOutcome::ProtocolError);
    master.set_reply(Reply::Body("{}".to_string()));
    assert_eq!(poller.poll_cycle().await, CycleOutcome::ProtocolError);

    let snapshot = cache.snapshot("htr_a").unwrap();
    assert_eq!(snapshot.consecutive_errors, 2);
    assert!(snapshot.last_error.unwrap().contains("500"));
    assert_eq!(snapshot.reading.unwrap().value, 40.0);
    assert_eq!(poller.next_delay(), Duration::from_millis(1000));

    master.set_reply(Reply::Ok("0x00C8".to_string()));
    assert!(matches!(poller.poll_cycle().await, CycleOutcome::Published(_)));
    let snapshot = cache.snapshot("htr_a").unwrap();
    assert_eq!(snapshot.consecutive_errors, 0);
    assert_eq!(snapshot.reading.unwrap().value, 20.0);

    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backoff_after_threshold() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;
    let poller = &setup.pollers[0];

    master.set_reply(Reply::Status(502));
    for _ in 0..12 {
        poller.poll_cycle().await;
    }

    assert_eq!(poller.next_delay(), Duration::from_secs(4));

    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_api_status_and_latest_reading() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;
    let api = BridgeApi::new(setup.context.clone());

    let missing = api.latest_reading("htr_a");
    assert_eq!(missing.status, RelayStatus::Error);
    assert!(missing.reading.is_none());

    setup.pollers[0].poll_cycle().await;

    let latest = api.latest_reading("htr_a");
    assert_eq!(latest.status, RelayStatus::Ok);
    assert_eq!(latest.reading.unwrap().value, 20.0);
    assert_eq!(api.latest_reading("nope").status, RelayStatus::Error);

    let status = api.get_status();
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["unit"], "unit1");
    assert_eq!(json["default_address"], "127.0.0.1");
    assert_eq!(json["devices"][0]["key"], "htr_a");
    assert_eq!(json["devices"][0]["consecutive_errors"], 0);
    assert_eq!(json["devices"][0]["reading"]["value"], 20.0);

    let relayed = api.set_port_output(6, true, None).await;
    assert!(relayed.is_ok());
    let read_back = api.get_port_output(6, Some("127.0.0.1")).await;
    assert!(read_back.is_ok());

    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bus_command_is_relayed() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;

    let results = session
        .declare_subscriber(result_key(&prefix))
        .await
        .expect("Failed to create subscriber");

    let intake = tokio::spawn(CommandIntake::new(setup.context.clone()).run());
    tokio::time::sleep(Duration::from_millis(200)).await;

    session
        .put(format!("{}/instrument/htr_a/iolink/6", prefix), "1")
        .await
        .expect("Failed to publish command");

    let sample = tokio::time::timeout(Duration::from_secs(5), results.recv_async())
        .await
        .expect("Timeout waiting for command result")
        .expect("Failed to receive result");
    let result: RelayResult =
        serde_json::from_slice(&sample.payload().to_bytes()).expect("Invalid result");

    assert_eq!(result.status, RelayStatus::Ok);
    assert_eq!(result.ip, "127.0.0.1");
    assert_eq!(result.port, 6);

    let requests = master.requests();
    let setdata = requests
        .iter()
        .find(|r| r.path.ends_with("/pdout/setdata"))
        .expect("no setdata request");
    assert_eq!(setdata.body.as_ref().unwrap()["data"]["newvalue"], "01");

    intake.abort();
    drop(results);
    session.close().await.expect("Failed to close session");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_command_is_dropped() {
    let prefix = unique_prefix();
    let master = FakeMaster::start().await;
    let (session, setup) = setup(&prefix, &master).await;

    let intake = CommandIntake::new(setup.context.clone());
    assert!(
        intake
            .handle(&format!("{}/instrument/htr_a/iolink/6", prefix), "maybe")
            .await
            .is_none()
    );
    assert!(master.requests().is_empty());

    let result = intake
        .handle(&format!("{}/instrument/unknown/iolink/port[2]", prefix), "0")
        .await
        .expect("relay result");
    assert_eq!(result.ip, "127.0.0.1");
    assert_eq!(
        master.requests()[0].path,
        "/iolinkmaster/port[2]/iolinkdevice/pdout/setdata"
    );

    session.close().await.expect("Failed to close session");
}
