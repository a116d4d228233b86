use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{ContentHandle, ContentId, Error, LengthCheck, Profile, Report, Result, ResultRecord};

const FILE_PREFIX: &str = "baseline";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub total_size: Option<u64>,
    pub content_type: Option<String>,
}

/// The profile a run used, as written to disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSnapshot {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub rounds: u32,
    pub num_chunks: u32,
    #[serde(alias = "same_media_requests")]
    pub same_object_requests: u32,
    pub timeout_seconds: f64,
    #[serde(alias = "same_media_id")]
    pub same_object_id: Option<ContentId>,
    #[serde(alias = "tests")]
    pub scenarios: Vec<String>,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub length_check: Option<LengthCheck>,
}

impl ProfileSnapshot {
    fn of(profile: &Profile, same_object_id: Option<ContentId>) -> Self {
        Self {
            chunk_size: profile.chunk_size,
            concurrency: profile.concurrency,
            rounds: profile.rounds,
            num_chunks: profile.num_chunks,
            same_object_requests: profile.same_object_requests,
            timeout_seconds: profile.timeout.as_secs_f64(),
            same_object_id,
            scenarios: profile.scenarios.iter().map(ToString::to_string).collect(),
            max_retries: profile.retry.max_retries,
            base_delay_ms: profile.retry.base_delay.as_millis() as u64,
            length_check: Some(profile.length_check),
        }
    }
}

/// Everything one run produced: metadata, probed objects and the ordered records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub timestamp: String,
    pub base_url: String,
    #[serde(default)]
    pub chunk_size: u64,
    #[serde(default)]
    pub concurrency: usize,
    #[serde(default, alias = "num_messages")]
    pub num_ids: usize,
    #[serde(default, alias = "message_ids")]
    pub content_ids: Vec<ContentId>,
    #[serde(default, alias = "tests_run")]
    pub scenarios: Vec<String>,
    #[serde(default, alias = "test_profile")]
    pub profile: ProfileSnapshot,
    #[serde(default)]
    pub media_info: BTreeMap<ContentId, MediaInfo>,
    pub results: Vec<ResultRecord>,
}

impl ResultFile {
    pub fn new(
        base_url: &str,
        profile: &Profile,
        content_ids: &[ContentId],
        handles: &[ContentHandle],
        same_object_id: Option<ContentId>,
        results: Vec<ResultRecord>,
    ) -> Self {
        let snapshot = ProfileSnapshot::of(profile, same_object_id);
        Self {
            timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            base_url: base_url.to_string(),
            chunk_size: profile.chunk_size,
            concurrency: profile.concurrency,
            num_ids: content_ids.len(),
            content_ids: content_ids.to_vec(),
            scenarios: snapshot.scenarios.clone(),
            profile: snapshot,
            media_info: handles
                .iter()
                .map(|h| {
                    (
                        h.content_id,
                        MediaInfo {
                            total_size: h.total_size,
                            content_type: h.content_type.clone(),
                        },
                    )
                })
                .collect(),
            results,
        }
    }

    /// Probed objects keyed by id, in the shape the report renderer takes.
    pub fn media(&self) -> BTreeMap<ContentId, ContentHandle> {
        self.media_info
            .iter()
            .map(|(id, info)| {
                (
                    *id,
                    ContentHandle {
                        content_id: *id,
                        total_size: info.total_size,
                        content_type: info.content_type.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn report(&self) -> Report {
        Report::build(&self.results)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|source| Error::ResultFile {
            path: path.display().to_string(),
            source,
        })
    }

    /// Encodes fully before touching the file, so a failure never leaves a partial document.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(Error::EncodeResults)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Lowercased alphanumerics, every other run of characters collapsed to a single `-`.
fn sanitize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

fn host_tag(base_url: &str) -> String {
    let host = match url::Url::parse(base_url) {
        Ok(u) => match (u.host_str(), u.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => base_url.to_string(),
        },
        Err(_) => base_url.to_string(),
    };
    sanitize(&host)
}

/// File name stem shared by every run against the same host with the same profile.
pub fn results_prefix(base_url: &str, profile: &Profile) -> String {
    format!(
        "{FILE_PREFIX}_{}_cs{}_c{}_r{}_nc{}_sm{}_t{}",
        host_tag(base_url),
        profile.chunk_size,
        profile.concurrency,
        profile.rounds,
        profile.num_chunks,
        profile.same_object_requests,
        profile.timeout.as_secs()
    )
}

/// Next free `<prefix>_seqNNN.json` in `dir` (one past the highest existing sequence).
/// Creates `dir` if needed.
pub fn next_results_path(dir: &Path, base_url: &str, profile: &Profile) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let prefix = results_prefix(base_url, profile);
    let seq_prefix = format!("{prefix}_seq");

    let mut max_seq = 0u32;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let seq = name
            .strip_prefix(&seq_prefix)
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|digits| digits.parse::<u32>().ok());
        if let Some(seq) = seq {
            max_seq = max_seq.max(seq);
        }
    }

    Ok(dir.join(format!("{seq_prefix}{:03}.json", max_seq + 1)))
}
