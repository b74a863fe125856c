//! End-to-end tests against a listening server.

use std::sync::Arc;
use std::time::Duration;

use request_shield::observability::{JsonLinesSink, TracingSink};
use request_shield::HttpServer;

mod common;

#[tokio::test]
async fn test_concurrent_clients_share_one_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.rate_limit.max_requests = 25;
    let server = HttpServer::new(config, Arc::new(TracingSink));
    let (addr, shutdown, handle) = common::start_server(server).await;

    let client = common::client();
    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let mut statuses = Vec::new();
                for _ in 0..10 {
                    let res = client
                        .get(format!("http://{addr}/documents"))
                        .header("x-forwarded-for", "203.0.113.9")
                        .send()
                        .await
                        .unwrap();
                    statuses.push(res.status().as_u16());
                }
                statuses
            })
        })
        .collect();

    let mut ok = 0;
    let mut throttled = 0;
    for task in tasks {
        for status in task.await.unwrap() {
            match status {
                200 => ok += 1,
                429 => throttled += 1,
                other => panic!("unexpected status {other}"),
            }
        }
    }
    assert_eq!(ok, 25);
    assert_eq!(throttled, 75);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_peer_address_is_identity_without_proxy_headers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(dir.path());
    config.rate_limit.max_requests = 2;
    let (server, _sink, _clock) = common::build_server(config);
    let limiter = server.state().guards.limiter().clone();
    let (addr, shutdown, handle) = common::start_server(server).await;

    let client = common::client();
    for expected in [200, 200, 429] {
        let res = client.get(format!("http://{addr}/documents")).send().await.unwrap();
        assert_eq!(res.status().as_u16(), expected);
    }
    assert!(!limiter.check("127.0.0.1").is_allowed());

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_security_events_written_as_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("security.log");
    let config = common::test_config(dir.path());
    let sink = Arc::new(JsonLinesSink::open(&log_path).unwrap());
    let (addr, shutdown, handle) = common::start_server(HttpServer::new(config, sink)).await;

    let client = common::client();
    client
        .get(format!("http://{addr}/wp-admin/setup.php"))
        .header("user-agent", "sqlmap/1.7")
        .send()
        .await
        .unwrap();

    shutdown.trigger();
    handle.await.unwrap().unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let event: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(event["event_type"], "SUSPICIOUS_ACTIVITY");
    assert_eq!(event["ip_address"], "127.0.0.1");
    assert_eq!(event["request_path"], "/wp-admin/setup.php");
    assert_eq!(event["details"]["detectors"], serde_json::json!(["suspicious-agent", "sensitive-path"]));
}
