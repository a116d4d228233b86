use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::Instant;

use crate::executor::execute;
use crate::report::RampRow;
use crate::retry::with_retry;
use crate::target::StreamTarget;
use crate::task::{
    burst_label, burst_tasks, multi_chunk_tasks, ramp_levels, ramp_tasks, same_object_tasks,
    sequential_tasks,
};
use crate::{
    ContentHandle, ContentId, Error, FetchTask, Profile, RecordSink, Recorder, Result,
    ResultRecord, Scenario,
};

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// One handle per probed object, in probe order.
    pub handles: Vec<ContentHandle>,
    pub same_object_id: Option<ContentId>,
    /// Every record, phase by phase, in completion order within a phase.
    pub records: Vec<ResultRecord>,
}

impl RunOutput {
    pub fn media(&self) -> BTreeMap<ContentId, ContentHandle> {
        self.handles
            .iter()
            .map(|h| (h.content_id, h.clone()))
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_success()).count()
    }
}

/// Probes every object, then runs the profile's scenarios in their fixed order.
///
/// Phases never abort the run: failed probes degrade to unknown sizes and failed fetches become
/// failed records.
pub struct Orchestrator<T> {
    target: Arc<T>,
    profile: Profile,
    recorder: Recorder,
}

impl<T: StreamTarget> Orchestrator<T> {
    pub fn new(target: T, profile: Profile, sink: Arc<dyn RecordSink>) -> Self {
        let recorder = Recorder::new(profile.length_check, sink);
        Self {
            target: Arc::new(target),
            profile,
            recorder,
        }
    }

    pub async fn run(&self, content_ids: &[ContentId]) -> Result<RunOutput> {
        if content_ids.is_empty() {
            return Err(Error::NoContentIds);
        }
        self.profile.validate()?;

        let same_object_id = self
            .profile
            .runs(Scenario::SameObject)
            .then(|| self.profile.same_object_id.unwrap_or(content_ids[0]));

        let mut probe_ids = content_ids.to_vec();
        if let Some(id) = same_object_id
            && !probe_ids.contains(&id)
        {
            probe_ids.push(id);
        }
        let handles = self.probe_all(&probe_ids).await;
        let phase_handles = &handles[..content_ids.len()];

        let mut records = Vec::new();
        for scenario in Scenario::ALL {
            if !self.profile.runs(scenario) {
                continue;
            }
            let before = records.len();
            tracing::info!(%scenario, "phase start");

            match scenario {
                Scenario::Sequential => {
                    let tasks = sequential_tasks(phase_handles, self.profile.chunk_size);
                    records.extend(self.run_tasks(tasks, 1).await);
                }
                Scenario::Burst => {
                    let rounds = self.profile.rounds;
                    for round in 1..=rounds {
                        if round > 1 {
                            tokio::time::sleep(self.profile.round_pause).await;
                        }
                        let label = burst_label(round, rounds);
                        let tasks = burst_tasks(phase_handles, self.profile.chunk_size, &label);
                        tracing::info!(round, rounds, tasks = tasks.len(), "burst round");
                        records.extend(self.run_tasks(tasks, self.profile.concurrency).await);
                    }
                }
                Scenario::MultiChunk => {
                    let tasks = multi_chunk_tasks(
                        phase_handles,
                        self.profile.chunk_size,
                        self.profile.num_chunks,
                    );
                    records.extend(self.run_tasks(tasks, self.profile.concurrency).await);
                }
                Scenario::SameObject => {
                    if let Some(handle) = same_object_id
                        .and_then(|id| handles.iter().find(|h| h.content_id == id))
                    {
                        let tasks = same_object_tasks(
                            handle,
                            self.profile.chunk_size,
                            self.profile.same_object_requests,
                        );
                        records.extend(self.run_tasks(tasks, self.profile.concurrency).await);
                    }
                }
                Scenario::RampUp => {
                    for level in ramp_levels(self.profile.concurrency) {
                        records.extend(self.run_ramp_level(phase_handles, level).await);
                        tokio::time::sleep(self.profile.ramp_cooldown).await;
                    }
                }
            }

            let phase = &records[before..];
            let ok = phase.iter().filter(|r| r.is_success()).count();
            tracing::info!(%scenario, ok, failed = phase.len() - ok, "phase done");
        }

        Ok(RunOutput {
            handles,
            same_object_id,
            records,
        })
    }

    async fn probe_all(&self, ids: &[ContentId]) -> Vec<ContentHandle> {
        let mut handles = Vec::with_capacity(ids.len());
        for &id in ids {
            let handle = match self.target.probe(id).await {
                Ok(handle) => {
                    tracing::info!(
                        content_id = id,
                        size = ?handle.total_size,
                        content_type = handle.content_type.as_deref().unwrap_or("?"),
                        "probed"
                    );
                    handle
                }
                Err(err) => {
                    tracing::warn!(content_id = id, error = %err, "size probe failed, size unknown");
                    ContentHandle::unknown(id)
                }
            };
            handles.push(handle);
        }
        handles
    }

    async fn run_ramp_level(&self, handles: &[ContentHandle], level: usize) -> Vec<ResultRecord> {
        let tasks = ramp_tasks(handles, self.profile.chunk_size, level);
        tracing::info!(level, requests = tasks.len(), "ramp level");

        let started = Instant::now();
        let batch = self.run_tasks(tasks, level).await;
        let wall_s = started.elapsed().as_secs_f64();

        let row = RampRow::from_records(level, &batch);
        tracing::info!(
            level,
            ok = row.ok,
            total = row.total,
            avg_ttfb_ms = row.avg_ttfb_ms.unwrap_or(0.0),
            avg_rate_mbps = row.avg_rate_mbps,
            agg_rate_mbps = row.aggregate_rate_mbps,
            wall_s,
            "ramp level done"
        );
        batch
    }

    async fn run_tasks(&self, tasks: Vec<FetchTask>, concurrency: usize) -> Vec<ResultRecord> {
        let target = Arc::clone(&self.target);
        let retry = self.profile.retry.clone();
        let fetch = move |task: FetchTask| {
            let target = Arc::clone(&target);
            let retry = retry.clone();
            async move { with_retry(&retry, || target.fetch(&task)).await }
        };

        execute(tasks, concurrency, fetch, |task, outcome| {
            self.recorder.record(task, outcome)
        })
        .await
    }
}
