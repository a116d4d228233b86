pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid result file `{path}`: {source}")]
    ResultFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode results: {0}")]
    EncodeResults(#[source] serde_json::Error),

    #[error("invalid base url `{0}` (expected http:// or https://)")]
    InvalidBaseUrl(String),

    #[error("at least one content id is required")]
    NoContentIds,

    #[error("`chunk_size` must be a positive integer")]
    InvalidChunkSize,

    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("`rounds` must be a positive integer")]
    InvalidRounds,

    #[error("`num_chunks` must be a positive integer")]
    InvalidNumChunks,

    #[error("`same_object_requests` must be a positive integer")]
    InvalidSameObjectRequests,

    #[error("`timeout` must be a positive duration")]
    InvalidTimeout,

    #[error("`scenarios` must name at least one scenario")]
    NoScenarios,
}
