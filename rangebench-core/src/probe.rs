use rangebench_http::{HttpClient, HttpRequest, Method, StreamedResponse, content_range_total};

use crate::{ContentHandle, ContentId};

#[derive(Debug, thiserror::Error)]
#[error("size probe for {content_id} failed: {source}")]
pub struct ProbeError {
    pub content_id: ContentId,
    #[source]
    pub source: rangebench_http::Error,
}

/// One way of discovering an object's size. Strategies are tried in [`SizeStrategy::CHAIN`]
/// order and the first size found wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SizeStrategy {
    /// `HEAD`: `Content-Length`, else a `Content-Range` total.
    Head,
    /// `GET` with `Range: bytes=0-1`: the `Content-Range` total.
    RangedGet,
}

impl SizeStrategy {
    pub const CHAIN: [Self; 2] = [Self::Head, Self::RangedGet];

    fn prepare(self, base: HttpRequest) -> HttpRequest {
        match self {
            Self::Head => HttpRequest {
                method: Method::HEAD,
                ..base
            },
            Self::RangedGet => base.with_range(0, 1),
        }
    }

    /// Only `2xx` heads describe the object. A `416` carries the complete length in
    /// `Content-Range: bytes */<total>`, so a ranged `GET` also trusts that.
    fn size_from(self, res: &StreamedResponse) -> Option<u64> {
        let from_range = || res.header("content-range").and_then(content_range_total);
        match self {
            Self::Head if is_2xx(res.status) => res
                .header("content-length")
                .and_then(|v| v.trim().parse().ok())
                .or_else(from_range),
            Self::Head => None,
            Self::RangedGet if is_2xx(res.status) || res.status == 416 => from_range(),
            Self::RangedGet => None,
        }
    }
}

fn is_2xx(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Runs the strategy chain for one object.
///
/// `base` is the authenticated `GET` for the object. A server that answers but never reveals a
/// size yields a handle with `total_size = None`; only transport failures on every strategy
/// are errors.
pub async fn probe_size(
    client: &HttpClient,
    content_id: ContentId,
    base: HttpRequest,
) -> Result<ContentHandle, ProbeError> {
    let mut handle = ContentHandle::unknown(content_id);
    let mut answered = false;
    let mut last_error = None;

    for strategy in SizeStrategy::CHAIN {
        match client.stream(strategy.prepare(base.clone())).await {
            Ok(res) => {
                answered = true;
                if handle.content_type.is_none() && is_2xx(res.status) {
                    handle.content_type = res.header("content-type").map(str::to_string);
                }
                if let Some(size) = strategy.size_from(&res) {
                    tracing::debug!(content_id, %strategy, size, "size probe");
                    handle.total_size = Some(size);
                    return Ok(handle);
                }
                tracing::debug!(content_id, %strategy, status = res.status, "size probe found no size");
            }
            Err(err) => {
                tracing::debug!(content_id, %strategy, error = %err, "size probe request failed");
                // The next strategy would build the same broken request.
                let transient = err.is_transient();
                last_error = Some(err);
                if !transient {
                    break;
                }
            }
        }
    }

    match (answered, last_error) {
        (false, Some(source)) => Err(ProbeError { content_id, source }),
        _ => Ok(handle),
    }
}
