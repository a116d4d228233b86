use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rangebench_core::auth::{exchange, sign_in};
use rangebench_core::{
    HttpTarget, Orchestrator, Profile, Report, ResultFile, RunOutput, TracingSink,
    next_results_path, normalize_base_url,
};
use rangebench_http::HttpClient;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::profile_yaml::resolve_profile;
use crate::run_error::RunError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Credentials {
    Anonymous,
    StreamToken(String),
    SignIn {
        api_key: String,
        email: String,
        password: String,
    },
}

fn credentials(args: &RunArgs) -> anyhow::Result<Credentials> {
    if args.no_auth {
        return Ok(Credentials::Anonymous);
    }
    if let Some(token) = args.stream_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(Credentials::StreamToken(token.to_string()));
    }
    match (&args.api_key, &args.email, &args.password) {
        (Some(api_key), Some(email), Some(password)) => Ok(Credentials::SignIn {
            api_key: api_key.clone(),
            email: email.clone(),
            password: password.clone(),
        }),
        _ => anyhow::bail!(
            "missing credentials: pass --stream-token (STREAM_TOKEN), or --api-key/--email/--password \
             (FIREBASE_API_KEY/FIREBASE_EMAIL/FIREBASE_PASSWORD), or --no-auth"
        ),
    }
}

fn now_epoch_s() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

async fn stream_token(
    client: &HttpClient,
    args: &RunArgs,
    base_url: &str,
    credentials: Credentials,
) -> anyhow::Result<Option<String>> {
    match credentials {
        Credentials::Anonymous => {
            tracing::warn!("running without a stream token");
            Ok(None)
        }
        Credentials::StreamToken(token) => {
            tracing::info!("using the provided stream token");
            Ok(Some(token))
        }
        Credentials::SignIn {
            api_key,
            email,
            password,
        } => {
            let id_token = sign_in(client, &args.identity_url, &api_key, &email, &password)
                .await
                .context("sign-in failed")?;
            let res = exchange(client, base_url, &args.exchange_path, &id_token)
                .await
                .context("token exchange failed")?;
            match res.ttl_secs(now_epoch_s()) {
                Some(ttl) => tracing::info!(ttl_s = ttl, "stream token acquired"),
                None => tracing::info!("stream token acquired (no expiry reported)"),
            }
            Ok(Some(res.stream_token))
        }
    }
}

fn save_results(
    args: &RunArgs,
    base_url: &str,
    profile: &Profile,
    output: RunOutput,
) -> anyhow::Result<PathBuf> {
    let path = next_results_path(&args.results_dir, base_url, profile)
        .with_context(|| format!("failed to prepare {}", args.results_dir.display()))?;
    let file = ResultFile::new(
        base_url,
        profile,
        &args.ids,
        &output.handles,
        output.same_object_id,
        output.records,
    );
    file.save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    if args.ids.is_empty() {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "no content ids given (use --ids 1,2,3 or RANGEBENCH_IDS)"
        )));
    }
    let base_url = normalize_base_url(&args.base_url)
        .map_err(|e| RunError::InvalidInput(e.into()))?;
    let profile = resolve_profile(&args).await.map_err(RunError::InvalidInput)?;
    let credentials = credentials(&args).map_err(RunError::InvalidInput)?;

    let client = HttpClient::default();
    let token = stream_token(&client, &args, &base_url, credentials)
        .await
        .map_err(RunError::Auth)?;

    tracing::info!(
        base_url = %base_url,
        ids = ?args.ids,
        chunk_size = profile.chunk_size,
        concurrency = profile.concurrency,
        rounds = profile.rounds,
        timeout = %humantime::format_duration(profile.timeout),
        "starting benchmark"
    );

    let mut target = HttpTarget::new(client, &base_url, profile.timeout)
        .map_err(|e| RunError::InvalidInput(e.into()))?
        .with_stream_path(&args.stream_path);
    if let Some(token) = token {
        target = target.with_token(token, args.token_mode.into());
    }

    let orchestrator = Orchestrator::new(target, profile.clone(), Arc::new(TracingSink));
    let output = orchestrator
        .run(&args.ids)
        .await
        .map_err(|e| RunError::InvalidInput(e.into()))?;

    let report = Report::build(&output.records);
    print!("{}", report.render(&output.media()));

    let code = ExitCode::from_failed_requests(output.failed_count());

    if args.no_save {
        return Ok(code);
    }
    // A results file that cannot be written does not change the outcome of the run.
    match save_results(&args, &base_url, &profile, output) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "results saved");
            println!("results: {}", path.display());
        }
        Err(err) => tracing::error!(error = %format!("{err:#}"), "failed to save results"),
    }

    Ok(code)
}
