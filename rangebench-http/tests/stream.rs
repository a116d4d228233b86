#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use rangebench_http::{HttpClient, HttpRequest, content_range_total};
use rangebench_testserver::{TestObject, TestServer, TestServerConfig};

async fn server() -> TestServer {
    let config = TestServerConfig::default()
        .with_object(1, TestObject::new(3 * 1024 * 1024))
        .with_object(2, TestObject::new(1000));
    TestServer::start(config).await.unwrap()
}

#[tokio::test]
async fn stream_counts_partial_body_and_reports_total() {
    let server = server().await;
    let client = HttpClient::default();

    let req = HttpRequest::get_owned(server.direct_url(1))
        .with_range(0, 1_048_575)
        .with_timeout(Duration::from_secs(10));
    let res = client.stream(req).await.unwrap();

    assert_eq!(res.status, 206);
    assert_eq!(res.bytes_read, 1_048_576);
    assert!(res.body_error.is_none());
    assert!(res.ttfb <= res.elapsed);
    assert_eq!(
        res.header("content-range").and_then(content_range_total),
        Some(3 * 1024 * 1024)
    );

    server.shutdown().await;
}

#[tokio::test]
async fn stream_range_past_end_is_truncated_by_server() {
    let server = server().await;
    let client = HttpClient::default();

    let res = client
        .stream(HttpRequest::get_owned(server.direct_url(2)).with_range(512, 4095))
        .await
        .unwrap();

    assert_eq!(res.status, 206);
    assert_eq!(res.bytes_read, 488);

    server.shutdown().await;
}

#[tokio::test]
async fn head_request_returns_length_without_body() {
    let server = server().await;
    let client = HttpClient::default();

    let res = client
        .request(HttpRequest::head(&server.direct_url(2)))
        .await
        .unwrap();

    assert_eq!(res.status, 200);
    assert!(res.body.is_empty());
    assert_eq!(res.header("content-length"), Some("1000"));
    assert_eq!(res.header("content-type"), Some("video/mp4"));
    assert_eq!(server.stats().head_requests(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_object_is_not_found() {
    let server = server().await;
    let client = HttpClient::default();

    let res = client
        .stream(HttpRequest::get_owned(server.direct_url(99)).with_range(0, 1))
        .await
        .unwrap();
    assert_eq!(res.status, 404);

    server.shutdown().await;
}
