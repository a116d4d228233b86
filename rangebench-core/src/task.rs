use crate::{ContentHandle, ContentId};

pub const SEQUENTIAL_LABEL: &str = "sequential";
pub const BURST_LABEL: &str = "burst";
pub const MULTI_CHUNK_LABEL_PREFIX: &str = "multi_chunk_";
pub const SAME_OBJECT_LABEL_PREFIX: &str = "same_object_";
pub const RAMP_LABEL_PREFIX: &str = "ramp_c";

const RAMP_LADDER: [usize; 7] = [1, 2, 4, 8, 12, 16, 20];

/// One byte-range fetch. `range_end` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub content_id: ContentId,
    pub range_start: u64,
    pub range_end: u64,
    pub label: String,
}

impl FetchTask {
    pub fn new(content_id: ContentId, range_start: u64, range_end: u64, label: impl Into<String>) -> Self {
        Self {
            content_id,
            range_start,
            range_end,
            label: label.into(),
        }
    }

    pub fn expected_bytes(&self) -> u64 {
        self.range_end - self.range_start + 1
    }

    /// The `Range` header form, e.g. `bytes=0-1048575`.
    pub fn range_spec(&self) -> String {
        format!("bytes={}-{}", self.range_start, self.range_end)
    }
}

/// Clamps `[start, start + chunk_size - 1]` to the object, or `None` when `start` is past its end.
fn bounded_range(start: u64, chunk_size: u64, total_size: Option<u64>) -> Option<(u64, u64)> {
    let end = start.saturating_add(chunk_size.saturating_sub(1));
    match total_size {
        Some(total) if start >= total => None,
        Some(total) => Some((start, end.min(total - 1))),
        None => Some((start, end)),
    }
}

fn first_chunk_tasks<'a>(
    handles: impl IntoIterator<Item = &'a ContentHandle>,
    chunk_size: u64,
    label: &str,
) -> Vec<FetchTask> {
    handles
        .into_iter()
        .filter_map(|h| {
            bounded_range(0, chunk_size, h.total_size)
                .map(|(start, end)| FetchTask::new(h.content_id, start, end, label))
        })
        .collect()
}

/// First chunk of every object, one after another.
pub fn sequential_tasks(handles: &[ContentHandle], chunk_size: u64) -> Vec<FetchTask> {
    first_chunk_tasks(handles, chunk_size, SEQUENTIAL_LABEL)
}

/// `burst` for a single round, `burst_r<round>` (1-based) when the burst repeats.
pub fn burst_label(round: u32, rounds: u32) -> String {
    if rounds > 1 {
        format!("{BURST_LABEL}_r{round}")
    } else {
        BURST_LABEL.to_string()
    }
}

/// First chunk of every object, all fired at once.
pub fn burst_tasks(handles: &[ContentHandle], chunk_size: u64, label: &str) -> Vec<FetchTask> {
    first_chunk_tasks(handles, chunk_size, label)
}

/// `num_chunks` consecutive chunks per object, stopping at the end of objects with a known size.
pub fn multi_chunk_tasks(handles: &[ContentHandle], chunk_size: u64, num_chunks: u32) -> Vec<FetchTask> {
    let mut tasks = Vec::new();
    for h in handles {
        for i in 0..num_chunks {
            let start = u64::from(i).saturating_mul(chunk_size);
            let Some((start, end)) = bounded_range(start, chunk_size, h.total_size) else {
                break;
            };
            tasks.push(FetchTask::new(
                h.content_id,
                start,
                end,
                format!("{MULTI_CHUNK_LABEL_PREFIX}{i}"),
            ));
        }
    }
    tasks
}

/// `num_requests` fetches against one object.
///
/// Offsets are spread evenly across objects larger than one chunk; otherwise the fetches walk
/// contiguous chunks from offset 0.
pub fn same_object_tasks(handle: &ContentHandle, chunk_size: u64, num_requests: u32) -> Vec<FetchTask> {
    let step = match handle.total_size {
        Some(total) if total > chunk_size => total / u64::from(num_requests.max(1)),
        _ => chunk_size,
    };

    (0..num_requests)
        .filter_map(|i| {
            let start = u64::from(i).saturating_mul(step);
            bounded_range(start, chunk_size, handle.total_size).map(|(start, end)| {
                FetchTask::new(
                    handle.content_id,
                    start,
                    end,
                    format!("{SAME_OBJECT_LABEL_PREFIX}{i}"),
                )
            })
        })
        .collect()
}

/// Concurrency levels visited by the ramp: the fixed ladder capped at `max`, always ending at `max`.
pub fn ramp_levels(max_concurrency: usize) -> Vec<usize> {
    let max = max_concurrency.max(1);
    let mut levels: Vec<usize> = RAMP_LADDER.iter().copied().filter(|l| *l <= max).collect();
    levels.push(max);
    levels.sort_unstable();
    levels.dedup();
    levels
}

pub fn ramp_label(level: usize) -> String {
    format!("{RAMP_LABEL_PREFIX}{level}")
}

/// Concurrency level embedded in a ramp label (`ramp_c8` -> 8).
pub fn ramp_level_of(label: &str) -> Option<usize> {
    label.strip_prefix(RAMP_LABEL_PREFIX)?.parse().ok()
}

/// `level` first-chunk fetches, cycling through `handles`.
pub fn ramp_tasks(handles: &[ContentHandle], chunk_size: u64, level: usize) -> Vec<FetchTask> {
    if handles.is_empty() {
        return Vec::new();
    }
    let label = ramp_label(level);
    first_chunk_tasks(
        (0..level).map(|i| &handles[i % handles.len()]),
        chunk_size,
        &label,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn known(id: ContentId, size: u64) -> ContentHandle {
        ContentHandle::unknown(id).with_size(size)
    }

    fn assert_in_bounds(tasks: &[FetchTask], total: u64) {
        for t in tasks {
            assert!(t.range_start <= t.range_end, "{t:?}");
            assert!(t.range_end < total, "{t:?} exceeds {total}");
        }
    }

    #[test]
    fn sequential_and_burst_use_first_chunk() {
        let handles = [ContentHandle::unknown(100), known(200, 10 * MIB)];
        let tasks = sequential_tasks(&handles, MIB);
        assert_eq!(
            tasks,
            vec![
                FetchTask::new(100, 0, MIB - 1, "sequential"),
                FetchTask::new(200, 0, MIB - 1, "sequential"),
            ]
        );

        let burst = burst_tasks(&handles, MIB, &burst_label(2, 3));
        assert!(burst.iter().all(|t| t.label == "burst_r2"));
        assert_eq!(burst_label(1, 1), "burst");
    }

    #[test]
    fn first_chunk_is_clamped_to_small_objects() {
        let tasks = sequential_tasks(&[known(1, 1000)], MIB);
        assert_eq!(tasks, vec![FetchTask::new(1, 0, 999, "sequential")]);
        assert_eq!(tasks[0].expected_bytes(), 1000);
    }

    #[test]
    fn empty_object_yields_no_tasks() {
        let h = known(1, 0);
        assert!(sequential_tasks(std::slice::from_ref(&h), MIB).is_empty());
        assert!(multi_chunk_tasks(std::slice::from_ref(&h), MIB, 5).is_empty());
        assert!(same_object_tasks(&h, MIB, 10).is_empty());
        assert!(ramp_tasks(std::slice::from_ref(&h), MIB, 4).is_empty());
    }

    #[test]
    fn multi_chunk_stops_at_object_end() {
        let total = 2 * MIB + MIB / 2;
        let tasks = multi_chunk_tasks(&[known(7, total)], MIB, 5);

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], FetchTask::new(7, 0, MIB - 1, "multi_chunk_0"));
        assert_eq!(tasks[1], FetchTask::new(7, MIB, 2 * MIB - 1, "multi_chunk_1"));
        assert_eq!(tasks[2], FetchTask::new(7, 2 * MIB, total - 1, "multi_chunk_2"));
        assert_in_bounds(&tasks, total);
    }

    #[test]
    fn multi_chunk_unknown_size_emits_every_chunk() {
        let tasks = multi_chunk_tasks(&[ContentHandle::unknown(1), ContentHandle::unknown(2)], MIB, 5);
        assert_eq!(tasks.len(), 10);
        assert_eq!(tasks[4].range_start, 4 * MIB);
        assert_eq!(tasks[5].content_id, 2);
    }

    #[test]
    fn same_object_spreads_offsets_over_large_objects() {
        let total = 10_485_760;
        let tasks = same_object_tasks(&known(5, total), MIB, 10);

        let starts: Vec<u64> = tasks.iter().map(|t| t.range_start).collect();
        let expected: Vec<u64> = (0..10).map(|i| i * 1_048_576).collect();
        assert_eq!(starts, expected);
        assert_eq!(tasks[9].range_end, total - 1);
        assert_eq!(tasks[3].label, "same_object_3");
        assert_in_bounds(&tasks, total);
    }

    #[test]
    fn same_object_uneven_step_clamps_end() {
        let total = 3 * MIB + 17;
        let tasks = same_object_tasks(&known(5, total), MIB, 4);
        let step = total / 4;
        for (i, t) in tasks.iter().enumerate() {
            assert_eq!(t.range_start, i as u64 * step);
            assert_eq!(t.range_end, (t.range_start + MIB - 1).min(total - 1));
        }
        assert_in_bounds(&tasks, total);
    }

    #[test]
    fn same_object_falls_back_to_contiguous_chunks() {
        let tasks = same_object_tasks(&ContentHandle::unknown(5), MIB, 3);
        let ranges: Vec<(u64, u64)> = tasks.iter().map(|t| (t.range_start, t.range_end)).collect();
        assert_eq!(ranges, vec![(0, MIB - 1), (MIB, 2 * MIB - 1), (2 * MIB, 3 * MIB - 1)]);

        // A known object no larger than one chunk only has room for the first fetch.
        let small = same_object_tasks(&known(5, 4096), MIB, 3);
        assert_eq!(small, vec![FetchTask::new(5, 0, 4095, "same_object_0")]);
    }

    #[test]
    fn ramp_levels_are_capped_and_end_at_max() {
        assert_eq!(ramp_levels(10), vec![1, 2, 4, 8, 10]);
        assert_eq!(ramp_levels(12), vec![1, 2, 4, 8, 12]);
        assert_eq!(ramp_levels(1), vec![1]);
        assert_eq!(ramp_levels(32), vec![1, 2, 4, 8, 12, 16, 20, 32]);
    }

    #[test]
    fn ramp_tasks_cycle_through_ids() {
        let handles = [ContentHandle::unknown(1), ContentHandle::unknown(2), ContentHandle::unknown(3)];
        let tasks = ramp_tasks(&handles, MIB, 4);
        let ids: Vec<ContentId> = tasks.iter().map(|t| t.content_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 1]);
        assert!(tasks.iter().all(|t| t.label == "ramp_c4"));
        assert_eq!(ramp_level_of("ramp_c4"), Some(4));
        assert_eq!(ramp_level_of("burst"), None);
    }
}
