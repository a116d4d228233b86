use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContentId, FetchTask, LengthCheck};

const MIB: f64 = 1024.0 * 1024.0;

/// `200` or `206` with no error. The only success rule used anywhere.
pub fn is_success(status: Option<u16>, error: Option<&str>) -> bool {
    matches!(status, Some(200 | 206)) && error.is_none()
}

/// Rounds to 4 decimal places, the precision records are kept and persisted at.
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// MiB per second, or `0` when nothing was read or no time elapsed.
pub fn throughput_mbps(bytes_read: u64, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 && bytes_read > 0 {
        (bytes_read as f64 / MIB) / elapsed_s
    } else {
        0.0
    }
}

/// Raw result of one network fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// `None` on transport failure.
    pub status: Option<u16>,
    pub bytes_read: u64,
    /// Request start to full body drain.
    pub elapsed_s: f64,
    /// Request start to response head. `None` when no response arrived.
    pub ttfb_s: Option<f64>,
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn transport_failure(error: impl Into<String>, elapsed_s: f64) -> Self {
        Self {
            status: None,
            bytes_read: 0,
            elapsed_s,
            ttfb_s: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status, self.error.as_deref())
    }
}

impl LengthCheck {
    /// Turns a length mismatch on an otherwise successful outcome into an error.
    pub fn apply(self, expected: u64, mut outcome: RequestOutcome) -> RequestOutcome {
        if !outcome.is_success() {
            return outcome;
        }
        let got = outcome.bytes_read;
        let ok = match self {
            Self::Off => true,
            Self::Strict => got == expected,
            Self::Lenient => got == expected || (outcome.status == Some(200) && got <= expected),
        };
        if !ok {
            outcome.error = Some(format!("length mismatch: got {got}, expected {expected}"));
        }
        outcome
    }
}

/// One finished fetch with the task that produced it. Timings are kept at 4 decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(alias = "message_id")]
    pub content_id: ContentId,
    #[serde(rename = "scenario_label", alias = "test_label")]
    pub label: String,
    #[serde(default)]
    pub range_start: u64,
    #[serde(default)]
    pub range_end: u64,
    pub status: Option<u16>,
    pub bytes_read: u64,
    #[serde(default)]
    pub expected_bytes: u64,
    pub elapsed_s: f64,
    pub ttfb_s: Option<f64>,
    pub throughput_mbps: f64,
    pub error: Option<String>,
}

impl ResultRecord {
    pub fn new(task: FetchTask, outcome: RequestOutcome) -> Self {
        let expected_bytes = task.expected_bytes();
        Self {
            content_id: task.content_id,
            label: task.label,
            range_start: task.range_start,
            range_end: task.range_end,
            status: outcome.status,
            bytes_read: outcome.bytes_read,
            expected_bytes,
            elapsed_s: round4(outcome.elapsed_s),
            ttfb_s: outcome.ttfb_s.map(round4),
            throughput_mbps: round4(throughput_mbps(outcome.bytes_read, outcome.elapsed_s)),
            error: outcome.error,
        }
    }

    pub fn is_success(&self) -> bool {
        is_success(self.status, self.error.as_deref())
    }
}

/// Receives every record as it completes.
pub trait RecordSink: Send + Sync {
    fn record(&self, record: &ResultRecord);
}

/// Logs one `info` event per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn record(&self, r: &ResultRecord) {
        let range = format!("{}-{}", r.range_start, r.range_end);
        let status = r.status.map_or_else(|| "ERR".to_string(), |s| s.to_string());
        tracing::info!(
            ok = r.is_success(),
            content_id = r.content_id,
            label = %r.label,
            range = %range,
            status = %status,
            bytes = r.bytes_read,
            expected = r.expected_bytes,
            ttfb_ms = r.ttfb_s.map_or(0.0, |t| t * 1000.0),
            elapsed_ms = r.elapsed_s * 1000.0,
            rate_mbps = r.throughput_mbps,
            error = r.error.as_deref().unwrap_or("none"),
            "request"
        );
    }
}

/// Length-checks outcomes, turns them into records and hands each one to the sink.
#[derive(Clone)]
pub struct Recorder {
    length_check: LengthCheck,
    sink: Arc<dyn RecordSink>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("length_check", &self.length_check)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    pub fn new(length_check: LengthCheck, sink: Arc<dyn RecordSink>) -> Self {
        Self { length_check, sink }
    }

    pub fn record(&self, task: FetchTask, outcome: RequestOutcome) -> ResultRecord {
        let outcome = self.length_check.apply(task.expected_bytes(), outcome);
        let record = ResultRecord::new(task, outcome);
        self.sink.record(&record);
        record
    }
}
