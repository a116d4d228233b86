use crate::ResultRecord;

/// Nearest-rank percentile of an ascending sample: `sorted[floor(n * q)]`, clamped to the last
/// element. No interpolation.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64) * q).floor() as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
}

impl Summary {
    pub fn from_samples(mut samples: Vec<f64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(f64::total_cmp);
        let n = samples.len();
        let sum: f64 = samples.iter().sum();
        Some(Self {
            min: samples[0],
            avg: sum / n as f64,
            max: samples[n - 1],
            p50: percentile(&samples, 0.50)?,
            p95: percentile(&samples, 0.95)?,
        })
    }
}

/// Counts over a group of records plus TTFB/elapsed (ms) and throughput (MB/s) summaries of its
/// successful members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateStats {
    pub ok_count: usize,
    pub fail_count: usize,
    /// Bytes read by successful requests.
    pub ok_bytes: u64,
    pub ttfb_ms: Option<Summary>,
    pub elapsed_ms: Option<Summary>,
    pub throughput_mbps: Option<Summary>,
}

impl AggregateStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut ok_count = 0;
        let mut fail_count = 0;
        let mut ok_bytes = 0u64;
        let mut ttfb = Vec::new();
        let mut elapsed = Vec::new();
        let mut rates = Vec::new();

        for r in records {
            if !r.is_success() {
                fail_count += 1;
                continue;
            }
            ok_count += 1;
            ok_bytes = ok_bytes.saturating_add(r.bytes_read);
            if let Some(t) = r.ttfb_s {
                ttfb.push(t * 1000.0);
            }
            elapsed.push(r.elapsed_s * 1000.0);
            rates.push(r.throughput_mbps);
        }

        Self {
            ok_count,
            fail_count,
            ok_bytes,
            ttfb_ms: Summary::from_samples(ttfb),
            elapsed_ms: Summary::from_samples(elapsed),
            throughput_mbps: Summary::from_samples(rates),
        }
    }

    pub fn total(&self) -> usize {
        self.ok_count + self.fail_count
    }

    pub fn all_failed(&self) -> bool {
        self.ok_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(status: Option<u16>, ttfb_s: Option<f64>, elapsed_s: f64, rate: f64) -> ResultRecord {
        ResultRecord {
            content_id: 1,
            label: "burst".to_string(),
            range_start: 0,
            range_end: 1023,
            status,
            bytes_read: if status.is_some() { 1024 } else { 0 },
            expected_bytes: 1024,
            elapsed_s,
            ttfb_s,
            throughput_mbps: rate,
            error: status.is_none().then(|| "timeout".to_string()),
        }
    }

    #[test]
    fn p95_of_twenty_is_the_last_element() {
        let sample: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile(&sample, 0.95), Some(20.0));
        assert_eq!(percentile(&sample, 0.50), Some(11.0));
        assert_eq!(percentile(&[3.0], 0.95), Some(3.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn summary_sorts_before_indexing() {
        let s = Summary::from_samples(vec![30.0, 10.0, 20.0, 40.0]).unwrap_or_else(|| panic!("empty"));
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 40.0);
        assert_eq!(s.avg, 25.0);
        assert_eq!(s.p50, 30.0);
        assert_eq!(s.p95, 40.0);
    }

    #[test]
    fn failures_are_counted_but_not_summarised() {
        let records = [
            rec(Some(206), Some(0.010), 0.1, 10.0),
            rec(Some(206), Some(0.030), 0.3, 5.0),
            rec(None, None, 120.0, 0.0),
            rec(Some(404), Some(0.002), 0.002, 0.0),
        ];
        let stats = AggregateStats::from_records(&records);

        assert_eq!(stats.ok_count, 2);
        assert_eq!(stats.fail_count, 2);
        assert_eq!(stats.ok_bytes, 2048);
        let ttfb = stats.ttfb_ms.unwrap_or_else(|| panic!("no ttfb"));
        assert_eq!(ttfb.min, 10.0);
        assert_eq!(ttfb.max, 30.0);
        let elapsed = stats.elapsed_ms.unwrap_or_else(|| panic!("no elapsed"));
        assert_eq!(elapsed.max, 300.0);
    }

    #[test]
    fn all_failed_group_has_no_summaries() {
        let stats = AggregateStats::from_records(&[rec(None, None, 1.0, 0.0)]);
        assert!(stats.all_failed());
        assert_eq!(stats.total(), 1);
        assert!(stats.ttfb_ms.is_none());
        assert!(stats.throughput_mbps.is_none());
    }

    #[test]
    fn aggregation_is_deterministic() {
        let records: Vec<ResultRecord> = (0..50)
            .map(|i| rec(Some(206), Some(0.001 * f64::from(i % 7)), 0.05 + 0.01 * f64::from(i), 3.25))
            .collect();
        assert_eq!(
            AggregateStats::from_records(&records),
            AggregateStats::from_records(&records)
        );
    }
}
