use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::format::{format_bytes, truncate_chars};
use crate::task::ramp_level_of;
use crate::{AggregateStats, ContentHandle, ContentId, ResultRecord, Summary};

const ERROR_SNIPPET_CHARS: usize = 80;

/// Distinct statuses (`ERR` for transport failures) and error strings of a group's failures.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FailureDetail {
    pub statuses: Vec<String>,
    pub errors: Vec<String>,
}

impl FailureDetail {
    fn from_records<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut statuses = BTreeSet::new();
        let mut errors = BTreeSet::new();
        for r in records.into_iter().filter(|r| !r.is_success()) {
            statuses.insert(r.status.map_or_else(|| "ERR".to_string(), |s| s.to_string()));
            errors.insert(truncate_chars(
                r.error.as_deref().unwrap_or("?"),
                ERROR_SNIPPET_CHARS,
            ));
        }
        Self {
            statuses: statuses.into_iter().collect(),
            errors: errors.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group<K> {
    pub key: K,
    pub stats: AggregateStats,
    pub failures: FailureDetail,
}

impl<K> Group<K> {
    fn new(key: K, records: &[&ResultRecord]) -> Self {
        Self {
            key,
            stats: AggregateStats::from_records(records.iter().copied()),
            failures: FailureDetail::from_records(records.iter().copied()),
        }
    }
}

/// One concurrency level of the ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct RampRow {
    pub level: usize,
    pub ok: usize,
    pub total: usize,
    pub avg_ttfb_ms: Option<f64>,
    pub avg_rate_mbps: f64,
    /// Sum of the successful requests' rates.
    pub aggregate_rate_mbps: f64,
}

impl RampRow {
    pub fn from_records<'a>(level: usize, records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let mut total = 0;
        let mut ok = 0;
        let mut ttfb_sum = 0.0;
        let mut rate_sum = 0.0;
        for r in records {
            total += 1;
            if !r.is_success() {
                continue;
            }
            ok += 1;
            rate_sum += r.throughput_mbps;
            ttfb_sum += r.ttfb_s.unwrap_or(0.0) * 1000.0;
        }
        Self {
            level,
            ok,
            total,
            // Averaged over every successful request; one without a TTFB counts as zero.
            avg_ttfb_ms: (ok > 0).then(|| ttfb_sum / ok as f64),
            avg_rate_mbps: if ok > 0 { rate_sum / ok as f64 } else { 0.0 },
            aggregate_rate_mbps: rate_sum,
        }
    }
}

/// Everything the summary shows, derived from an ordered record sequence and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub by_label: Vec<Group<String>>,
    pub by_content: Vec<Group<ContentId>>,
    pub ramp: Vec<RampRow>,
    pub overall: AggregateStats,
}

impl Report {
    pub fn build(records: &[ResultRecord]) -> Self {
        let mut labels: BTreeMap<&str, Vec<&ResultRecord>> = BTreeMap::new();
        let mut contents: BTreeMap<ContentId, Vec<&ResultRecord>> = BTreeMap::new();
        for r in records {
            labels.entry(r.label.as_str()).or_default().push(r);
            contents.entry(r.content_id).or_default().push(r);
        }

        let mut ramp: Vec<RampRow> = labels
            .iter()
            .filter_map(|(label, group)| {
                ramp_level_of(label).map(|level| RampRow::from_records(level, group.iter().copied()))
            })
            .collect();
        ramp.sort_by_key(|row| row.level);

        let mut by_label: Vec<Group<String>> = labels
            .iter()
            .map(|(label, group)| Group::new(label.to_string(), group))
            .collect();
        by_label.sort_by(|a, b| natural_key(&a.key).cmp(&natural_key(&b.key)));

        Self {
            by_label,
            by_content: contents
                .iter()
                .map(|(id, group)| Group::new(*id, group))
                .collect(),
            ramp,
            overall: AggregateStats::from_records(records),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.overall.fail_count == 0
    }

    /// Renders the human summary. `media` annotates the per-content section with probed sizes.
    pub fn render(&self, media: &BTreeMap<ContentId, ContentHandle>) -> String {
        let mut out = String::new();

        writeln!(&mut out, "{}", rule('=')).ok();
        writeln!(&mut out, "  PERFORMANCE SUMMARY").ok();
        writeln!(&mut out, "{}", rule('=')).ok();

        for group in &self.by_label {
            let s = &group.stats;
            writeln!(&mut out).ok();
            if s.all_failed() {
                writeln!(&mut out, "  [{}] ALL {} FAILED", group.key, s.total()).ok();
            } else {
                writeln!(
                    &mut out,
                    "  [{}] {} OK / {} FAILED",
                    group.key, s.ok_count, s.fail_count
                )
                .ok();
                writeln!(&mut out, "      total bytes: {}", format_bytes(s.ok_bytes)).ok();
            }
            render_failures(&mut out, &group.failures);
            render_summaries(&mut out, s);
        }

        writeln!(&mut out).ok();
        writeln!(&mut out, "{}", rule('-')).ok();
        writeln!(&mut out, "  PER-CONTENT BREAKDOWN").ok();
        writeln!(&mut out, "{}", rule('-')).ok();

        for group in &self.by_content {
            let handle = media.get(&group.key);
            let size = handle
                .and_then(|h| h.total_size)
                .map_or_else(|| "unknown".to_string(), format_bytes);
            let content_type = handle
                .and_then(|h| h.content_type.as_deref())
                .unwrap_or("?");
            let s = &group.stats;

            writeln!(&mut out).ok();
            writeln!(
                &mut out,
                "  content_id={}  size={size}  type={content_type}",
                group.key
            )
            .ok();
            writeln!(
                &mut out,
                "      requests={}  ok={}  failed={}",
                s.total(),
                s.ok_count,
                s.fail_count
            )
            .ok();
            render_failures(&mut out, &group.failures);
            render_summaries(&mut out, s);
        }

        if !self.ramp.is_empty() {
            writeln!(&mut out).ok();
            writeln!(&mut out, "{}", rule('-')).ok();
            writeln!(&mut out, "  RAMP-UP SCALING").ok();
            writeln!(&mut out, "{}", rule('-')).ok();
            for row in &self.ramp {
                let label = format!("c={}", row.level);
                if row.ok == 0 {
                    writeln!(&mut out, "  {label:>6}  ALL FAILED ({} requests)", row.total).ok();
                    continue;
                }
                writeln!(
                    &mut out,
                    "  {label:>6}  ok={:>3}/{:<3}  avg_ttfb={:>7.0}ms  avg_rate={:>8.2} MB/s  agg_rate={:>8.2} MB/s",
                    row.ok,
                    row.total,
                    row.avg_ttfb_ms.unwrap_or(0.0),
                    row.avg_rate_mbps,
                    row.aggregate_rate_mbps
                )
                .ok();
            }
        }

        let o = &self.overall;
        writeln!(&mut out).ok();
        writeln!(&mut out, "{}", rule('=')).ok();
        writeln!(
            &mut out,
            "  OVERALL: {} OK / {} FAILED / {} total",
            o.ok_count,
            o.fail_count,
            o.total()
        )
        .ok();
        writeln!(&mut out, "{}", rule('=')).ok();
        render_summaries(&mut out, o);

        out
    }
}

/// Orders `burst_r2` before `burst_r10`: the stem, then the numeric suffix, then the raw label.
fn natural_key(label: &str) -> (&str, Option<u64>, &str) {
    let stem = label.trim_end_matches(|c: char| c.is_ascii_digit());
    (stem, label[stem.len()..].parse().ok(), label)
}

fn rule(c: char) -> String {
    std::iter::repeat_n(c, 72).collect()
}

fn render_failures(out: &mut String, failures: &FailureDetail) {
    if failures.statuses.is_empty() {
        return;
    }
    writeln!(out, "      statuses: {}", failures.statuses.join(", ")).ok();
    for e in &failures.errors {
        writeln!(out, "      error: {e}").ok();
    }
}

fn render_summaries(out: &mut String, s: &AggregateStats) {
    if let Some(t) = &s.ttfb_ms {
        render_ms(out, "ttfb", t);
    }
    if let Some(e) = &s.elapsed_ms {
        render_ms(out, "total", e);
    }
    if let Some(r) = &s.throughput_mbps {
        writeln!(
            out,
            "      {:<6} min={:>8.2}  avg={:>8.2}  max={:>8.2}  p50={:>8.2}  p95={:>8.2} MB/s",
            "rate", r.min, r.avg, r.max, r.p50, r.p95
        )
        .ok();
    }
}

fn render_ms(out: &mut String, name: &str, s: &Summary) {
    writeln!(
        out,
        "      {:<6} min={:>6.0}ms  avg={:>6.0}ms  max={:>6.0}ms  p50={:>6.0}ms  p95={:>6.0}ms",
        name, s.min, s.avg, s.max, s.p50, s.p95
    )
    .ok();
}
