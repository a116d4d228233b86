#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;

use rangebench_core::auth::{self, ExchangeError};
use rangebench_core::{
    FetchTask, HttpTarget, Orchestrator, Profile, RetryPolicy, Scenario, StreamTarget,
    TokenMode, TracingSink, with_retry,
};
use rangebench_http::HttpClient;
use rangebench_testserver::{PATH_EXCHANGE, PATH_SIGN_IN, TestObject, TestServer, TestServerConfig};

const MIB: u64 = 1024 * 1024;

fn target(server: &TestServer) -> HttpTarget {
    HttpTarget::new(HttpClient::default(), server.base_url(), Duration::from_secs(10)).unwrap()
}

#[tokio::test]
async fn probe_discovers_size_and_type() {
    let server = TestServer::start(TestServerConfig::default().with_object(1, TestObject::new(3 * MIB)))
        .await
        .unwrap();

    let handle = target(&server).probe(1).await.unwrap();
    assert_eq!(handle.total_size, Some(3 * MIB));
    assert_eq!(handle.content_type.as_deref(), Some("video/mp4"));

    // Missing objects still answer, so the probe succeeds without a size.
    let missing = target(&server).probe(404).await.unwrap();
    assert_eq!(missing.total_size, None);

    server.shutdown().await;
}

#[tokio::test]
async fn probe_of_unreachable_host_is_an_error() {
    let target = HttpTarget::new(
        HttpClient::new(Some(Duration::from_millis(200))),
        "http://127.0.0.1:1",
        Duration::from_secs(1),
    )
    .unwrap();
    assert!(target.probe(1).await.is_err());
}

#[tokio::test]
async fn fetch_records_status_bytes_and_timings() {
    let server = TestServer::start(TestServerConfig::default().with_object(1, TestObject::new(3 * MIB)))
        .await
        .unwrap();
    let target = target(&server);

    let outcome = target.fetch(&FetchTask::new(1, MIB, 2 * MIB - 1, "multi_chunk_1")).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.status, Some(206));
    assert_eq!(outcome.bytes_read, MIB);
    let ttfb = outcome.ttfb_s.unwrap();
    assert!(ttfb <= outcome.elapsed_s);

    let past_end = target.fetch(&FetchTask::new(1, 5 * MIB, 6 * MIB - 1, "x")).await;
    assert_eq!(past_end.status, Some(416));
    assert!(!past_end.is_success());

    server.shutdown().await;
}

#[tokio::test]
async fn token_modes_are_accepted_by_the_server() {
    let config = TestServerConfig::default()
        .with_object(1, TestObject::new(4096))
        .with_stream_token("secret");
    let server = TestServer::start(config).await.unwrap();
    let task = FetchTask::new(1, 0, 1023, "sequential");

    let anonymous = target(&server).fetch(&task).await;
    assert_eq!(anonymous.status, Some(401));

    for mode in [TokenMode::Query, TokenMode::Header, TokenMode::Bearer] {
        let outcome = target(&server).with_token("secret", mode).fetch(&task).await;
        assert!(outcome.is_success(), "{mode}: {outcome:?}");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn transient_server_errors_are_retried_through_the_orchestrator() {
    // The size probe's HEAD and ranged GET take the first two 503s; the fetch gets the rest.
    let config = TestServerConfig::default().with_object(1, TestObject::new(MIB).failing_first(4));
    let server = TestServer::start(config).await.unwrap();

    let profile = Profile {
        scenarios: vec![Scenario::Sequential],
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        },
        ..Profile::default()
    };
    let orchestrator = Orchestrator::new(target(&server), profile, Arc::new(TracingSink));

    let out = orchestrator.run(&[1]).await.unwrap();

    assert_eq!(out.records.len(), 1);
    assert!(out.records[0].is_success(), "{:?}", out.records[0]);
    assert_eq!(server.stats().injected_failures(), 4);

    server.shutdown().await;
}

#[tokio::test]
async fn size_comes_from_ranged_get_when_head_is_not_allowed() {
    let config = TestServerConfig::default().with_object(1, TestObject::new(5 * MIB).with_head_status(405));
    let server = TestServer::start(config).await.unwrap();

    let handle = target(&server).probe(1).await.unwrap();
    assert_eq!(handle.total_size, Some(5 * MIB));
    assert_eq!(handle.content_type.as_deref(), Some("video/mp4"));
    assert_eq!(server.stats().head_requests(), 1);
    assert_eq!(server.stats().range_requests(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn redirected_head_does_not_size_the_object() {
    let config = TestServerConfig::default().with_object(1, TestObject::new(3 * MIB).with_head_status(301));
    let server = TestServer::start(config).await.unwrap();

    let handle = target(&server).probe(1).await.unwrap();
    assert_eq!(handle.total_size, Some(3 * MIB));
    assert_eq!(handle.content_type.as_deref(), Some("video/mp4"));

    let profile = Profile {
        scenarios: vec![Scenario::Sequential, Scenario::MultiChunk],
        num_chunks: 2,
        ..Profile::default()
    };
    let out = Orchestrator::new(target(&server), profile, Arc::new(TracingSink))
        .run(&[1])
        .await
        .unwrap();
    assert_eq!(out.records.len(), 3);
    assert_eq!(out.failed_count(), 0);

    server.shutdown().await;
}

/// Accepts connections, answers each with a `206` head promising 100 bytes, sends 10 and hangs
/// up. Returns the base URL and the number of accepted connections.
async fn truncating_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 206 Partial Content\r\n\
                          Content-Length: 100\r\n\
                          Content-Range: bytes 0-99/1000\r\n\r\n\
                          0123456789",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), accepted)
}

#[tokio::test]
async fn body_cut_short_is_a_retried_transport_failure() {
    let (base_url, accepted) = truncating_server().await;
    let target = HttpTarget::new(HttpClient::default(), &base_url, Duration::from_secs(5)).unwrap();
    let task = FetchTask::new(1, 0, 99, "sequential");
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
    };

    let outcome = with_retry(&policy, || target.fetch(&task)).await;

    assert_eq!(outcome.status, None, "{outcome:?}");
    assert_eq!(outcome.bytes_read, 0);
    assert_eq!(outcome.ttfb_s, None);
    assert!(outcome.error.as_deref().unwrap().contains("body"), "{outcome:?}");
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sign_in_and_exchange_yield_a_stream_token() {
    let config = TestServerConfig {
        token_ttl_secs: 600,
        ..TestServerConfig::default()
            .with_stream_token("stream-abc")
            .with_credentials("bench@example.com", "pw")
    };
    let server = TestServer::start(config).await.unwrap();
    let client = HttpClient::default();
    let identity_url = format!("{}{PATH_SIGN_IN}", server.base_url());

    let rejected = auth::sign_in(&client, &identity_url, "key", "bench@example.com", "wrong").await;
    match rejected {
        Err(auth::AuthError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "INVALID_LOGIN_CREDENTIALS");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    let id_token = auth::sign_in(&client, &identity_url, "key", "bench@example.com", "pw")
        .await
        .unwrap();
    let exchanged = auth::exchange(&client, server.base_url(), PATH_EXCHANGE, &id_token)
        .await
        .unwrap();
    assert_eq!(exchanged.stream_token, "stream-abc");
    assert!(exchanged.expires_at.is_some());

    let bad = auth::exchange(&client, server.base_url(), PATH_EXCHANGE, "forged").await;
    assert!(matches!(bad, Err(ExchangeError::Rejected { status: 401, .. })));

    server.shutdown().await;
}
