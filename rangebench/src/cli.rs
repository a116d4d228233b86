use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use rangebench_core::{ContentId, Scenario};
use rangebench_core::auth::{DEFAULT_EXCHANGE_PATH, DEFAULT_IDENTITY_URL};
use rangebench_core::target::DEFAULT_STREAM_PATH;

fn parse_duration(input: &str) -> Result<Duration, String> {
    let d = humantime::parse_duration(input.trim())
        .map_err(|e| format!("invalid duration '{input}' (expected e.g. 10s, 250ms, 1m): {e}"))?;
    if d.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenMode {
    /// `?st=<token>` query parameter.
    Query,
    /// `x-stream-token` header.
    Header,
    /// `Authorization: Bearer <token>`.
    Bearer,
}

impl From<TokenMode> for rangebench_core::TokenMode {
    fn from(value: TokenMode) -> Self {
        match value {
            TokenMode::Query => Self::Query,
            TokenMode::Header => Self::Header,
            TokenMode::Bearer => Self::Bearer,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "rangebench",
    author,
    version,
    about = "Byte-range streaming benchmark",
    long_about = "rangebench measures how a media streaming endpoint serves HTTP byte-range requests.\n\nA run probes each content id for its size, then executes the sequential, burst, multi-chunk, same-object and ramp-up phases, prints a performance summary and saves every request record to a JSON results file.\n\nThe stream token comes from --stream-token (or STREAM_TOKEN), or from a password sign-in followed by a token exchange.",
    after_help = "Examples:\n  rangebench run --ids 101,102,103 --stream-token $TOKEN\n  rangebench run --base-url https://media.example.com --ids 7 --profile quick.yaml\n  rangebench analyze results/baseline_media_example_com_cs1048576_c12_r3_nc5_sm10_t120_seq001.json"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the benchmark against a streaming endpoint.
    Run(RunArgs),

    /// Re-print the summary of one or more saved results files.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Streaming service base URL.
    #[arg(long, env = "RANGEBENCH_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Content ids to benchmark (comma-separated).
    #[arg(long, value_delimiter = ',', env = "RANGEBENCH_IDS")]
    pub ids: Vec<ContentId>,

    /// Content id targeted by the same-object phase (defaults to the first id).
    #[arg(long)]
    pub same_object_id: Option<ContentId>,

    /// YAML profile overriding the built-in benchmark parameters.
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Range size in bytes.
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Concurrency for burst/multi-chunk/same-object phases and the ramp-up ceiling.
    #[arg(long, short = 'c')]
    pub concurrency: Option<usize>,

    /// Number of burst rounds.
    #[arg(long)]
    pub rounds: Option<u32>,

    /// Phases to run (comma-separated), e.g. `sequential,burst`. Always executed in the canonical order.
    #[arg(long, value_delimiter = ',')]
    pub scenarios: Vec<Scenario>,

    /// Per-request timeout (e.g. 30s, 2m).
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Directory for results files.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Do not write a results file.
    #[arg(long)]
    pub no_save: bool,

    /// Stream token to use as-is (skips sign-in and exchange).
    #[arg(long, env = "STREAM_TOKEN", hide_env_values = true)]
    pub stream_token: Option<String>,

    /// Send requests without any stream token.
    #[arg(long, conflicts_with = "stream_token")]
    pub no_auth: bool,

    /// How the stream token is attached to each request.
    #[arg(long, value_enum, default_value_t = TokenMode::Query)]
    pub token_mode: TokenMode,

    /// Identity provider API key.
    #[arg(long, env = "FIREBASE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sign-in email.
    #[arg(long, env = "FIREBASE_EMAIL")]
    pub email: Option<String>,

    /// Sign-in password.
    #[arg(long, env = "FIREBASE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Password sign-in endpoint.
    #[arg(long, default_value = DEFAULT_IDENTITY_URL)]
    pub identity_url: String,

    /// Token exchange path, relative to the base URL.
    #[arg(long, default_value = DEFAULT_EXCHANGE_PATH)]
    pub exchange_path: String,

    /// Streaming path prefix, relative to the base URL.
    #[arg(long, default_value = DEFAULT_STREAM_PATH)]
    pub stream_path: String,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Results files written by `rangebench run`.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("rangebench").chain(args.iter().copied()))
    }

    fn run_args(args: &[&str]) -> RunArgs {
        let mut full = vec!["run"];
        full.extend_from_slice(args);
        match parse(&full) {
            Ok(Cli {
                command: Command::Run(args),
                ..
            }) => args,
            other => panic!("expected run args, got {other:?}"),
        }
    }

    #[test]
    fn ids_are_comma_separated() {
        let args = run_args(&["--ids", "101,102,103", "--no-auth"]);
        assert_eq!(args.ids, vec![101, 102, 103]);
        assert!(args.no_auth);
    }

    #[test]
    fn ids_may_be_repeated() {
        let args = run_args(&["--ids", "1", "--ids", "2,3"]);
        assert_eq!(args.ids, vec![1, 2, 3]);
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        assert!(parse(&["run", "--ids", "1,abc"]).is_err());
    }

    #[test]
    fn timeout_accepts_humantime() {
        let args = run_args(&["--timeout", "1m 30s"]);
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn scenarios_parse_snake_case() {
        let args = run_args(&["--scenarios", "ramp_up,sequential"]);
        assert_eq!(args.scenarios, vec![Scenario::RampUp, Scenario::Sequential]);
        assert!(parse(&["run", "--scenarios", "warmup"]).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(parse(&["run", "--timeout", "0s"]).is_err());
    }

    #[test]
    fn token_mode_maps_to_core() {
        let args = run_args(&["--token-mode", "bearer"]);
        assert_eq!(
            rangebench_core::TokenMode::from(args.token_mode),
            rangebench_core::TokenMode::Bearer
        );
    }

    #[test]
    fn stream_token_conflicts_with_no_auth() {
        assert!(parse(&["run", "--stream-token", "t", "--no-auth"]).is_err());
    }

    #[test]
    fn analyze_requires_a_file() {
        assert!(parse(&["analyze"]).is_err());
        let cli = parse(&["analyze", "a.json", "b.json"]);
        assert!(matches!(
            cli,
            Ok(Cli { command: Command::Analyze(AnalyzeArgs { ref files }), .. }) if files.len() == 2
        ));
    }

    #[test]
    fn verbose_is_global() {
        let cli = parse(&["run", "-vv", "--no-auth"]);
        assert!(matches!(cli, Ok(Cli { verbose: 2, .. })));
    }
}
