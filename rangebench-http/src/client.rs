use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::time::Instant;

use super::util::{has_header, host_header_value, merge_headers};
use super::{Error, HttpRequest, HttpResponse, Result, StreamedResponse};

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be tens of seconds; surface unreachable hosts promptly.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);

        Self { inner }
    }

    /// Sends `req` and buffers the whole response body.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout;
        let deadline = timeout.map(|t| Instant::now() + t);
        let built = build_request(req)?;

        let res = self.send(built, deadline, timeout).await?;
        let (parts, body) = res.into_parts();
        let headers = merge_headers(&parts.headers);

        let body = match (deadline, timeout) {
            (Some(deadline), Some(timeout)) => {
                match tokio::time::timeout_at(deadline, body.collect()).await {
                    Ok(collected) => collected?.to_bytes(),
                    Err(_) => return Err(Error::Timeout(timeout)),
                }
            }
            _ => body.collect().await?.to_bytes(),
        };

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            body,
            headers,
        })
    }

    /// Sends `req` and drains the body frame by frame, counting bytes without keeping them.
    ///
    /// The request timeout (if any) is a single deadline covering both the response head and
    /// the body. Failures before the head arrives are returned as `Err`; failures while draining
    /// are reported through [`StreamedResponse::body_error`] together with the bytes seen so far.
    pub async fn stream(&self, req: HttpRequest) -> Result<StreamedResponse> {
        let timeout = req.timeout;
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let built = build_request(req)?;

        let res = self.send(built, deadline, timeout).await?;
        let ttfb = started.elapsed();

        let (parts, mut body) = res.into_parts();
        let headers = merge_headers(&parts.headers);

        let mut bytes_read = 0u64;
        let mut body_error = None;
        loop {
            let next = match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    match tokio::time::timeout_at(deadline, body.frame()).await {
                        Ok(next) => next,
                        Err(_) => {
                            body_error = Some(Error::Timeout(timeout));
                            break;
                        }
                    }
                }
                _ => body.frame().await,
            };

            match next {
                Some(Ok(frame)) => {
                    if let Some(chunk) = frame.data_ref() {
                        bytes_read = bytes_read.saturating_add(chunk.len() as u64);
                    }
                }
                Some(Err(err)) => {
                    body_error = Some(Error::BodyRead(err));
                    break;
                }
                None => break,
            }
        }

        Ok(StreamedResponse {
            status: parts.status.as_u16(),
            headers,
            bytes_read,
            ttfb,
            elapsed: started.elapsed(),
            body_error,
        })
    }

    async fn send(
        &self,
        req: Request<Full<Bytes>>,
        deadline: Option<Instant>,
        timeout: Option<Duration>,
    ) -> Result<hyper::Response<Incoming>> {
        match (deadline, timeout) {
            (Some(deadline), Some(timeout)) => {
                match tokio::time::timeout_at(deadline, self.inner.request(req)).await {
                    Ok(res) => Ok(res?),
                    Err(_) => Err(Error::Timeout(timeout)),
                }
            }
            _ => Ok(self.inner.request(req).await?),
        }
    }
}

fn build_request(req: HttpRequest) -> Result<Request<Full<Bytes>>> {
    let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::UnsupportedScheme(req.url));
    }

    let uri: hyper::Uri = req
        .url
        .parse()
        .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

    let mut builder = Request::builder().method(req.method).uri(uri);

    if !has_header(&req.headers, "host")
        && let Some(host) = host_header_value(&parsed)
    {
        builder = builder.header(http::header::HOST, host);
    }
    if !req.body.is_empty() && !has_header(&req.headers, "content-length") {
        builder = builder.header(http::header::CONTENT_LENGTH, req.body.len());
    }

    for (k, v) in req.headers {
        let name = http::header::HeaderName::from_bytes(k.as_bytes()).map_err(http::Error::from)?;
        let value = http::header::HeaderValue::from_str(&v).map_err(http::Error::from)?;
        builder = builder.header(name, value);
    }

    Ok(builder.body(Full::new(req.body))?)
}
