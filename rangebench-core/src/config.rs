use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ContentId, Error, Result};

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_NUM_CHUNKS: u32 = 5;
pub const DEFAULT_CONCURRENCY: usize = 12;
pub const DEFAULT_SAME_OBJECT_REQUESTS: u32 = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_ROUNDS: u32 = 3;
pub const DEFAULT_ROUND_PAUSE: Duration = Duration::from_secs(1);
pub const DEFAULT_RAMP_COOLDOWN: Duration = Duration::from_millis(500);

/// Workload pattern. The string form is used by profiles, the CLI and result files.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    Sequential,
    Burst,
    MultiChunk,
    SameObject,
    RampUp,
}

impl Scenario {
    /// Every scenario, in execution order.
    pub const ALL: [Self; 5] = [
        Self::Sequential,
        Self::Burst,
        Self::MultiChunk,
        Self::SameObject,
        Self::RampUp,
    ];
}

/// How strictly a successful response's body length is checked against the requested range.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LengthCheck {
    Off,
    /// Exact length, or a `200` whose body is no longer than the range (server ignored `Range`).
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Backoff before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

/// Benchmark parameters shared by every phase of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub rounds: u32,
    pub num_chunks: u32,
    pub same_object_requests: u32,
    /// Per-fetch deadline, covering the response head and the body drain.
    pub timeout: Duration,
    pub scenarios: Vec<Scenario>,
    pub round_pause: Duration,
    pub ramp_cooldown: Duration,
    pub retry: RetryPolicy,
    pub length_check: LengthCheck,
    /// Target of the same-object phase. `None` picks the first content id.
    pub same_object_id: Option<ContentId>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            rounds: DEFAULT_ROUNDS,
            num_chunks: DEFAULT_NUM_CHUNKS,
            same_object_requests: DEFAULT_SAME_OBJECT_REQUESTS,
            timeout: DEFAULT_TIMEOUT,
            scenarios: Scenario::ALL.to_vec(),
            round_pause: DEFAULT_ROUND_PAUSE,
            ramp_cooldown: DEFAULT_RAMP_COOLDOWN,
            retry: RetryPolicy::default(),
            length_check: LengthCheck::default(),
            same_object_id: None,
        }
    }
}

impl Profile {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        if self.rounds == 0 {
            return Err(Error::InvalidRounds);
        }
        if self.num_chunks == 0 {
            return Err(Error::InvalidNumChunks);
        }
        if self.same_object_requests == 0 {
            return Err(Error::InvalidSameObjectRequests);
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        if self.scenarios.is_empty() {
            return Err(Error::NoScenarios);
        }
        Ok(())
    }

    pub fn runs(&self, scenario: Scenario) -> bool {
        self.scenarios.contains(&scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn default_profile_is_valid_and_runs_everything() {
        let profile = Profile::default();
        assert!(profile.validate().is_ok());
        assert!(Scenario::ALL.iter().all(|s| profile.runs(*s)));
        assert_eq!(profile.retry.max_retries, 2);
        assert_eq!(profile.length_check, LengthCheck::Lenient);
    }

    #[test]
    fn validate_rejects_zero_values() {
        let cases: [fn(&mut Profile); 7] = [
            |p| p.chunk_size = 0,
            |p| p.concurrency = 0,
            |p| p.rounds = 0,
            |p| p.num_chunks = 0,
            |p| p.same_object_requests = 0,
            |p| p.timeout = Duration::ZERO,
            |p| p.scenarios.clear(),
        ];
        for mutate in cases {
            let mut profile = Profile::default();
            mutate(&mut profile);
            assert!(profile.validate().is_err(), "{profile:?}");
        }
    }

    #[test]
    fn scenario_names_are_snake_case() {
        assert_eq!(Scenario::SameObject.to_string(), "same_object");
        assert_eq!(Scenario::from_str("ramp_up").ok(), Some(Scenario::RampUp));
        assert!(Scenario::from_str("ramp").is_err());
    }
}
