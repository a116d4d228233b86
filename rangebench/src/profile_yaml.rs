use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use rangebench_core::{ContentId, LengthCheck, Profile, Scenario};

use crate::cli::RunArgs;

/// Overlay for [`Profile`]. Every key is optional; missing keys keep the built-in defaults.
///
/// ```yaml
/// chunk_size: 524288
/// concurrency: 4
/// timeout: 30s
/// scenarios: [sequential, burst]
/// retry:
///   max_retries: 1
///   base_delay: 100ms
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProfileYaml {
    pub chunk_size: Option<u64>,
    pub concurrency: Option<usize>,
    pub rounds: Option<u32>,
    pub num_chunks: Option<u32>,
    #[serde(alias = "same_media_requests")]
    pub same_object_requests: Option<u32>,
    pub timeout: Option<YamlDuration>,
    pub scenarios: Option<Vec<Scenario>>,
    pub round_pause: Option<YamlDuration>,
    pub ramp_cooldown: Option<YamlDuration>,
    pub retry: Option<RetryYaml>,
    pub length_check: Option<LengthCheck>,
    pub same_object_id: Option<ContentId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RetryYaml {
    pub max_retries: Option<u32>,
    pub base_delay: Option<YamlDuration>,
}

impl ProfileYaml {
    pub(crate) fn apply(self, mut profile: Profile) -> Profile {
        if let Some(v) = self.chunk_size {
            profile.chunk_size = v;
        }
        if let Some(v) = self.concurrency {
            profile.concurrency = v;
        }
        if let Some(v) = self.rounds {
            profile.rounds = v;
        }
        if let Some(v) = self.num_chunks {
            profile.num_chunks = v;
        }
        if let Some(v) = self.same_object_requests {
            profile.same_object_requests = v;
        }
        if let Some(v) = self.timeout {
            profile.timeout = v.into_inner();
        }
        if let Some(v) = self.scenarios {
            profile.scenarios = v;
        }
        if let Some(v) = self.round_pause {
            profile.round_pause = v.into_inner();
        }
        if let Some(v) = self.ramp_cooldown {
            profile.ramp_cooldown = v.into_inner();
        }
        if let Some(retry) = self.retry {
            if let Some(v) = retry.max_retries {
                profile.retry.max_retries = v;
            }
            if let Some(v) = retry.base_delay {
                profile.retry.base_delay = v.into_inner();
            }
        }
        if let Some(v) = self.length_check {
            profile.length_check = v;
        }
        if self.same_object_id.is_some() {
            profile.same_object_id = self.same_object_id;
        }
        profile
    }
}

/// A duration written as a humantime string (`10s`, `250ms`), integer seconds, or float seconds.
/// Zero is accepted; `Profile::validate` rejects a zero timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("duration cannot be negative"))?;
                Ok(YamlDuration(Duration::from_secs(secs)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) fn parse_profile_yaml(raw: &str) -> anyhow::Result<ProfileYaml> {
    // An empty document is a valid "no overrides" profile.
    if raw.trim().is_empty() {
        return Ok(ProfileYaml::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

pub(crate) async fn load_profile_yaml(path: &Path) -> anyhow::Result<ProfileYaml> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read profile YAML: {}", path.display()))?;
    parse_profile_yaml(&raw).with_context(|| format!("failed to parse profile YAML: {}", path.display()))
}

/// Built-in defaults, then the YAML profile, then CLI flags.
pub(crate) async fn resolve_profile(args: &RunArgs) -> anyhow::Result<Profile> {
    let mut profile = Profile::default();
    if let Some(path) = &args.profile {
        profile = load_profile_yaml(path).await?.apply(profile);
    }
    apply_cli_overrides(&mut profile, args);
    profile.validate().context("invalid benchmark profile")?;
    Ok(profile)
}

fn apply_cli_overrides(profile: &mut Profile, args: &RunArgs) {
    if let Some(v) = args.chunk_size {
        profile.chunk_size = v;
    }
    if let Some(v) = args.concurrency {
        profile.concurrency = v;
    }
    if let Some(v) = args.rounds {
        profile.rounds = v;
    }
    if let Some(v) = args.timeout {
        profile.timeout = v;
    }
    if !args.scenarios.is_empty() {
        profile.scenarios = args.scenarios.clone();
    }
    if args.same_object_id.is_some() {
        profile.same_object_id = args.same_object_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn parse(raw: &str) -> ProfileYaml {
        match parse_profile_yaml(raw) {
            Ok(v) => v,
            Err(err) => panic!("profile should parse: {err:#}"),
        }
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let argv = ["rangebench", "run"].into_iter().chain(extra.iter().copied());
        match crate::cli::Cli::try_parse_from(argv) {
            Ok(crate::cli::Cli {
                command: crate::cli::Command::Run(args),
                ..
            }) => args,
            other => panic!("expected run args, got {other:?}"),
        }
    }

    #[test]
    fn empty_document_keeps_defaults() {
        assert_eq!(parse("").apply(Profile::default()), Profile::default());
        assert_eq!(parse("  \n").apply(Profile::default()), Profile::default());
    }

    #[test]
    fn overlay_replaces_only_given_keys() {
        let profile = parse(
            "chunk_size: 4096\nconcurrency: 3\nscenarios: [burst, sequential]\nlength_check: strict\n",
        )
        .apply(Profile::default());

        assert_eq!(profile.chunk_size, 4096);
        assert_eq!(profile.concurrency, 3);
        assert_eq!(profile.scenarios, vec![Scenario::Burst, Scenario::Sequential]);
        assert_eq!(profile.length_check, LengthCheck::Strict);
        assert_eq!(profile.rounds, Profile::default().rounds);
        assert_eq!(profile.timeout, Profile::default().timeout);
    }

    #[test]
    fn durations_accept_strings_and_numbers() {
        let profile = parse("timeout: 1m\nround_pause: 0\nramp_cooldown: 0.25\nretry:\n  base_delay: 50ms\n")
            .apply(Profile::default());
        assert_eq!(profile.timeout, Duration::from_secs(60));
        assert_eq!(profile.round_pause, Duration::ZERO);
        assert_eq!(profile.ramp_cooldown, Duration::from_millis(250));
        assert_eq!(profile.retry.base_delay, Duration::from_millis(50));
        assert_eq!(profile.retry.max_retries, Profile::default().retry.max_retries);
    }

    #[test]
    fn negative_or_garbage_durations_are_rejected() {
        assert!(parse_profile_yaml("timeout: -3").is_err());
        assert!(parse_profile_yaml("timeout: soon").is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_profile_yaml("chunk_sizee: 10").is_err());
        assert!(parse_profile_yaml("scenarios: [warmup]").is_err());
    }

    #[test]
    fn legacy_key_name_is_accepted() {
        let profile = parse("same_media_requests: 4").apply(Profile::default());
        assert_eq!(profile.same_object_requests, 4);
    }

    #[tokio::test]
    async fn cli_flags_win_over_yaml() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "concurrency: 3\nrounds: 7\nsame_object_id: 9\n")?;
        let path_arg = path.to_string_lossy().to_string();

        let args = run_args(&["--profile", &path_arg, "--concurrency", "5", "--same-object-id", "11"]);
        let profile = resolve_profile(&args).await?;

        assert_eq!(profile.concurrency, 5);
        assert_eq!(profile.rounds, 7);
        assert_eq!(profile.same_object_id, Some(11));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_values_fail_validation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "concurrency: 0\n")?;
        let path_arg = path.to_string_lossy().to_string();

        let args = run_args(&["--profile", &path_arg]);
        assert!(resolve_profile(&args).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn missing_profile_file_is_an_error() {
        let args = run_args(&["--profile", "/definitely/not/here.yaml"]);
        assert!(resolve_profile(&args).await.is_err());
    }
}
