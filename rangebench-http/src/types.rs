use std::time::Duration;

use bytes::Bytes;

use super::Error;
use super::util::header_value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// A response whose body was drained and counted instead of buffered.
#[derive(Debug)]
pub struct StreamedResponse {
    pub status: u16,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    /// Body bytes observed before the stream ended (or failed).
    pub bytes_read: u64,
    /// Request start to response head.
    pub ttfb: Duration,
    /// Request start to the end of the body drain.
    pub elapsed: Duration,
    /// Set when the body could not be drained to completion (timeout or read failure).
    pub body_error: Option<Error>,
}

impl StreamedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self::new(http::Method::GET, url.to_string(), Bytes::new())
    }

    pub fn get_owned(url: String) -> Self {
        Self::new(http::Method::GET, url, Bytes::new())
    }

    pub fn head(url: &str) -> Self {
        Self::new(http::Method::HEAD, url.to_string(), Bytes::new())
    }

    pub fn post(url: &str, body: Bytes) -> Self {
        Self::new(http::Method::POST, url.to_string(), body)
    }

    fn new(method: http::Method, url: String, body: Bytes) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds `Range: bytes=<start>-<end>` (inclusive end).
    #[must_use]
    pub fn with_range(self, start: u64, end: u64) -> Self {
        self.with_header("range", format!("bytes={start}-{end}"))
    }
}
