use std::future::Future;
use std::time::Duration;

use rangebench_http::{HttpClient, HttpRequest, StreamedResponse};
use tokio::time::Instant;

use crate::probe::{ProbeError, probe_size};
use crate::{ContentHandle, ContentId, Error, FetchTask, RequestOutcome, Result};

pub const DEFAULT_STREAM_PATH: &str = "/direct";

/// The endpoint under test, as seen by the orchestrator.
pub trait StreamTarget: Send + Sync + 'static {
    /// Discovers size and content type of one object.
    fn probe(&self, content_id: ContentId) -> impl Future<Output = std::result::Result<ContentHandle, ProbeError>> + Send;

    /// Performs one range request. Never fails: transport errors become failed outcomes.
    fn fetch(&self, task: &FetchTask) -> impl Future<Output = RequestOutcome> + Send;
}

/// How the stream token travels with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TokenMode {
    /// `?st=<token>`
    #[default]
    Query,
    /// `x-stream-token: <token>`
    Header,
    /// `Authorization: Bearer <token>`
    Bearer,
}

/// Trims trailing slashes and checks the scheme.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {
            Ok(trimmed.to_string())
        }
        _ => Err(Error::InvalidBaseUrl(raw.to_string())),
    }
}

/// Streams ranges from `<base_url><stream_path>/<content_id>` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: HttpClient,
    base_url: String,
    stream_path: String,
    token: Option<String>,
    token_mode: TokenMode,
    timeout: Duration,
}

impl HttpTarget {
    pub fn new(client: HttpClient, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            token: None,
            token_mode: TokenMode::default(),
            timeout,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, mode: TokenMode) -> Self {
        self.token = Some(token.into());
        self.token_mode = mode;
        self
    }

    #[must_use]
    pub fn with_stream_path(mut self, path: &str) -> Self {
        let trimmed = path.trim().trim_matches('/');
        self.stream_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn content_url(&self, content_id: ContentId) -> String {
        let url = format!("{}{}/{content_id}", self.base_url, self.stream_path);
        match (&self.token, self.token_mode) {
            (Some(token), TokenMode::Query) => match url::Url::parse(&url) {
                Ok(mut parsed) => {
                    parsed.query_pairs_mut().append_pair("st", token);
                    parsed.into()
                }
                Err(_) => url,
            },
            _ => url,
        }
    }

    /// The authenticated `GET` for one object, before any `Range` is added.
    pub fn request(&self, content_id: ContentId) -> HttpRequest {
        let req = HttpRequest::get_owned(self.content_url(content_id)).with_timeout(self.timeout);
        match (&self.token, self.token_mode) {
            (Some(token), TokenMode::Header) => req.with_header("x-stream-token", token.as_str()),
            (Some(token), TokenMode::Bearer) => req.with_header("authorization", format!("Bearer {token}")),
            _ => req,
        }
    }
}

impl StreamTarget for HttpTarget {
    async fn probe(&self, content_id: ContentId) -> std::result::Result<ContentHandle, ProbeError> {
        probe_size(&self.client, content_id, self.request(content_id)).await
    }

    async fn fetch(&self, task: &FetchTask) -> RequestOutcome {
        let req = self
            .request(task.content_id)
            .with_range(task.range_start, task.range_end);
        let started = Instant::now();

        match self.client.stream(req).await {
            Ok(res) if res.status >= 400 => RequestOutcome {
                status: Some(res.status),
                bytes_read: 0,
                elapsed_s: res.elapsed.as_secs_f64(),
                ttfb_s: Some(res.ttfb.as_secs_f64()),
                error: Some(format!("HTTP {}", res.status)),
            },
            // A body cut short is a transport failure, whatever status the head carried.
            Ok(StreamedResponse {
                status,
                bytes_read,
                body_error: Some(err),
                elapsed,
                ..
            }) => {
                tracing::debug!(
                    content_id = task.content_id,
                    status,
                    bytes_read,
                    error = %err,
                    "body interrupted"
                );
                RequestOutcome::transport_failure(err.to_string(), elapsed.as_secs_f64())
            }
            Ok(res) => RequestOutcome {
                status: Some(res.status),
                bytes_read: res.bytes_read,
                elapsed_s: res.elapsed.as_secs_f64(),
                ttfb_s: Some(res.ttfb.as_secs_f64()),
                error: None,
            },
            Err(err) => {
                tracing::debug!(
                    content_id = task.content_id,
                    transient = err.is_transient(),
                    error = %err,
                    "transport failure"
                );
                RequestOutcome::transport_failure(err.to_string(), started.elapsed().as_secs_f64())
            }
        }
    }
}
