#![forbid(unsafe_code)]

mod config;
mod content;
mod error;
mod executor;
mod format;
mod orchestrator;
mod record;
mod report;
mod results_file;
mod retry;
mod stats;

pub mod auth;
pub mod probe;
pub mod target;
pub mod task;

pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_NUM_CHUNKS, DEFAULT_RAMP_COOLDOWN,
    DEFAULT_ROUND_PAUSE, DEFAULT_ROUNDS, DEFAULT_SAME_OBJECT_REQUESTS, DEFAULT_TIMEOUT,
    LengthCheck, Profile, RetryPolicy, Scenario,
};
pub use content::{ContentHandle, ContentId};
pub use error::{Error, Result};
pub use executor::execute;
pub use orchestrator::{Orchestrator, RunOutput};
pub use record::{
    RecordSink, Recorder, RequestOutcome, ResultRecord, TracingSink, is_success, round4,
    throughput_mbps,
};
pub use report::{FailureDetail, Group, RampRow, Report};
pub use results_file::{MediaInfo, ProfileSnapshot, ResultFile, next_results_path, results_prefix};
pub use retry::{is_retriable, with_retry};
pub use stats::{AggregateStats, Summary, percentile};
pub use target::{HttpTarget, StreamTarget, TokenMode, normalize_base_url};
pub use task::FetchTask;
