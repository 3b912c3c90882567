use anyhow::Context;
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wdf_core::config::{ConfigError, ScanConfig};
use wdf_core::model::RequestResult;
use wdf_core::report::{Report, generate_pretty_report, write_json};
use wdf_core::rules::RuleSet;
use wdf_core::scan::Scanner;
use wdf_scanner::crawler::MAX_CRAWL_DEPTH;

/// Failures the binary reports before exiting.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to compile built-in rules: {0}")]
    Rules(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl CliError {
    /// 1 for I/O failures, 2 for usage, configuration and rule problems.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Io(_) => 1,
            CliError::Usage(_) | CliError::Config(_) | CliError::Rules(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(CliError::Usage(format!("unknown report format: {}", s))),
        }
    }
}

/// Parsed command line for one scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub url: Option<String>,
    pub list: Option<String>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub quiet: bool,
    pub config: ScanConfig,
}

impl ScanOptions {
    pub fn from_matches(args: &ArgMatches) -> Result<Self, CliError> {
        let url = args.get_one::<String>("url").cloned();
        let list = args.get_one::<String>("list").cloned();
        if url.is_none() && list.is_none() {
            return Err(CliError::Usage(
                "must provide -u/--url or -l/--list".to_string(),
            ));
        }

        let format = args
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("json")
            .parse::<OutputFormat>()?;

        let defaults = ScanConfig::default();
        let config = ScanConfig {
            concurrency: args
                .get_one::<usize>("concurrency")
                .copied()
                .unwrap_or(defaults.concurrency),
            timeout_secs: args
                .get_one::<u64>("timeout")
                .copied()
                .unwrap_or(defaults.timeout_secs),
            enable_robots: args.get_flag("enable-robots"),
            enable_sitemap: args.get_flag("enable-sitemap"),
            enable_crawl: args.get_flag("enable-crawl"),
            crawl_depth: args
                .get_one::<usize>("crawl-depth")
                .copied()
                .unwrap_or(defaults.crawl_depth)
                .min(MAX_CRAWL_DEPTH),
            crawl_limit: args
                .get_one::<usize>("crawl-limit")
                .copied()
                .unwrap_or(defaults.crawl_limit),
            ..defaults
        };
        config.validate()?;

        Ok(Self {
            url,
            list,
            output: args.get_one::<PathBuf>("output").cloned(),
            format,
            quiet: args.get_flag("quiet"),
            config,
        })
    }
}

/// Trimmed, deduplicated and sorted targets from list file content. Blank
/// lines and lines starting with `#` are skipped.
pub fn parse_target_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Read targets from a list file. A leading `~` is expanded.
pub fn load_targets_from_file(path: &str) -> anyhow::Result<Vec<String>> {
    let expanded = shellexpand::tilde(path);
    let content = fs::read_to_string(expanded.as_ref())
        .with_context(|| format!("failed to read target list {}", expanded))?;
    Ok(parse_target_lines(&content))
}

/// Targets from either a single `--url` or a `--list` file.
pub fn load_targets(url: Option<&str>, list: Option<&str>) -> anyhow::Result<Vec<String>> {
    match (url, list) {
        (Some(url), _) => Ok(parse_target_lines(url)),
        (None, Some(list)) => load_targets_from_file(list),
        (None, None) => Ok(Vec::new()),
    }
}

fn build_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} [{elapsed}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Planning...");
    spinner
}

/// Cancel `cancel` on the first Ctrl-C.
fn install_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, reporting partial results");
            cancel.cancel();
        }
    });
}

/// Run a scan and write its report.
pub async fn handle_scan(options: ScanOptions) -> Result<(), CliError> {
    let targets = load_targets(options.url.as_deref(), options.list.as_deref())?;
    if targets.is_empty() {
        return Err(CliError::Usage("no targets to scan".to_string()));
    }

    let rules = RuleSet::default_rules()?;

    let spinner = build_spinner(options.quiet);
    let probed = Arc::new(AtomicUsize::new(0));
    let progress = {
        let spinner = spinner.clone();
        let probed = probed.clone();
        Arc::new(move |result: &RequestResult| {
            let n = probed.fetch_add(1, Ordering::Relaxed) + 1;
            spinner.set_message(format!("{} probed, last {}", n, result.url));
        })
    };

    let scanner = Scanner::new(options.config.clone(), rules)?.with_progress_callback(progress);

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone());

    info!("Starting scan of {} targets", targets.len());
    let results = scanner.scan(&targets, &cancel).await;
    spinner.finish_and_clear();

    let findings: usize = results.iter().map(|t| t.findings().count()).sum();
    info!(
        "Probed {} paths, {} findings",
        probed.load(Ordering::Relaxed),
        findings
    );

    let report = Report::new(options.config, results);
    write_report(&report, options.format, options.output.as_deref())?;
    Ok(())
}

/// Write `report` to `output`, or stdout when no path is given. The pretty
/// view is colored only when stdout is a terminal.
pub fn write_report(
    report: &Report,
    format: OutputFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            render(report, format, false, &mut writer)
                .with_context(|| format!("failed to write report to {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            let color = stdout.is_terminal();
            render(report, format, color, stdout.lock()).context("failed to write report")
        }
    }
}

fn render<W: Write>(report: &Report, format: OutputFormat, color: bool, mut writer: W) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(writer, report),
        OutputFormat::Pretty => {
            writer.write_all(generate_pretty_report(report, color).as_bytes())?;
            writer.flush()
        }
    }
}
