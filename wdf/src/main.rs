use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wdf::{ScanOptions, command_argument_builder, handle_scan};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = command_argument_builder().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let result = match ScanOptions::from_matches(&matches) {
        Ok(options) => handle_scan(options).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Logs go to stderr so a JSON report on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
