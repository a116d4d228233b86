use anyhow::Context as _;

use rangebench_core::ResultFile;

use crate::cli::AnalyzeArgs;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;

/// Re-renders saved runs. Failed requests inside a file do not affect the exit code.
pub fn analyze(args: AnalyzeArgs) -> Result<ExitCode, RunError> {
    for path in &args.files {
        let file = ResultFile::load(path)
            .with_context(|| format!("failed to load results file {}", path.display()))
            .map_err(RunError::Runtime)?;

        println!("file: {}", path.display());
        println!("timestamp: {}", file.timestamp);
        println!("base_url: {}", file.base_url);
        println!(
            "chunk_size: {}  concurrency: {}  records: {}",
            file.chunk_size,
            file.concurrency,
            file.results.len()
        );
        print!("{}", file.report().render(&file.media()));
        println!();
    }
    Ok(ExitCode::Success)
}
