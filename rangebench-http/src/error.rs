use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// A request that produced no usable response, or whose body stopped early.
///
/// An HTTP status, error or not, is never an `Error`: it comes back as a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme (expected http or https): {0}")]
    UnsupportedScheme(String),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("connection failed: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response body interrupted: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    /// Whether sending the same request again could succeed. A request that could not be built
    /// fails the same way every time.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_) | Self::BodyRead(_))
    }
}
