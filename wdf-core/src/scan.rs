//! Multi-target scan orchestration.
//!
//! One producer task plans each target and feeds a bounded job queue, a fixed
//! pool of workers probes and classifies, and the calling task drains the
//! result queue into per-target lists.

use crate::analyze::{analyze, apply_index_check};
use crate::config::{ConfigError, ScanConfig};
use crate::index::IndexChecker;
use crate::model::{Analysis, PathCandidate, RequestResult, Severity, TargetResult};
use crate::plan::build_path_plan;
use crate::remediate::recommended_fix;
use crate::rules::RuleSet;
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use wdf_scanner::fetch::build_client;
use wdf_scanner::normalize::{TargetError, normalize_target, origin_of, resolve_path};
use wdf_scanner::probe::Prober;

/// Invoked by the aggregator for every result as it arrives.
pub type ProgressCallback = Arc<dyn Fn(&RequestResult) + Send + Sync>;

pub const INVALID_TARGET_REASON: &str = "invalid target";

struct Job {
    target: String,
    base: Url,
    candidate: PathCandidate,
}

struct JobResult {
    target: String,
    result: RequestResult,
}

/// Read-only state shared by every worker.
struct WorkerContext {
    prober: Prober,
    rules: Arc<RuleSet>,
    index_checker: Option<Arc<dyn IndexChecker>>,
}

pub struct Scanner {
    config: ScanConfig,
    rules: Arc<RuleSet>,
    client: Client,
    progress_callback: Option<ProgressCallback>,
}

impl Scanner {
    pub fn new(config: ScanConfig, rules: RuleSet) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = build_client(&config.user_agent, config.timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            config,
            rules: Arc::new(rules),
            client,
            progress_callback: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan every target. Targets are deduplicated and reported in sorted
    /// order; each target's results are sorted by path, then URL.
    ///
    /// Nothing here fails the whole scan: invalid targets get one synthetic
    /// result and per-probe failures are recorded on their result. Cancelling
    /// `cancel` stops job dispatch and whatever was collected is returned.
    pub async fn scan(&self, targets: &[String], cancel: &CancellationToken) -> Vec<TargetResult> {
        let started = Utc::now();
        let workers = self.config.concurrency.max(1);

        let mut raws: Vec<String> = targets.to_vec();
        raws.sort();
        raws.dedup();

        let mut out: Vec<TargetResult> = Vec::with_capacity(raws.len());
        let mut index_by_target: HashMap<String, usize> = HashMap::with_capacity(raws.len());
        let mut planned: Vec<(String, Url)> = Vec::new();

        for raw in raws {
            let shell = match normalize_target(&raw) {
                Ok(target) => {
                    planned.push((raw.clone(), target.url));
                    TargetResult {
                        target: raw.clone(),
                        normalized: target.normalized,
                        started_at: started,
                        finished_at: started,
                        results: Vec::new(),
                    }
                }
                Err(e) => {
                    warn!("Skipping invalid target {:?}: {}", raw, e);
                    TargetResult {
                        target: raw.clone(),
                        normalized: String::new(),
                        started_at: started,
                        finished_at: Utc::now(),
                        results: vec![invalid_target_result(&raw, &e)],
                    }
                }
            };
            index_by_target.insert(raw, out.len());
            out.push(shell);
        }

        info!(
            "Scanning {} targets ({} valid) with {} workers",
            out.len(),
            planned.len(),
            workers
        );

        let (job_tx, job_rx) = mpsc::channel::<Job>(workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(workers * 2);

        let context = Arc::new(WorkerContext {
            prober: Prober::new(self.client.clone(), self.config.timeout())
                .with_max_snippet(self.config.max_snippet),
            rules: self.rules.clone(),
            index_checker: self.config.index_checker.clone(),
        });

        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let context = context.clone();
            let cancel = cancel.clone();

            worker_handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };

                    let result = execute_job(&job, &context, &cancel).await;
                    let message = JobResult {
                        target: job.target,
                        result,
                    };
                    if result_tx.send(message).await.is_err() {
                        break;
                    }
                }
                debug!("Worker {} finished", worker_id);
            }));
        }
        // Workers hold the only senders; aggregation ends when they all exit.
        drop(result_tx);

        let producer = {
            let client = self.client.clone();
            let config = self.config.clone();
            let rules = self.rules.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                for (raw, base) in planned {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let plan = build_path_plan(&client, &config, &rules, &base, &cancel).await;
                    for candidate in plan {
                        let job = Job {
                            target: raw.clone(),
                            base: base.clone(),
                            candidate,
                        };
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                debug!("Scan cancelled, closing job queue");
                                return;
                            }
                            sent = job_tx.send(job) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            })
        };

        let out = Mutex::new(out);
        while let Some(JobResult { target, result }) = result_rx.recv().await {
            if let Some(callback) = &self.progress_callback {
                callback(&result);
            }
            let mut guard = out.lock().await;
            match index_by_target.get(&target) {
                Some(&i) => guard[i].results.push(result),
                None => warn!("Result for unknown target {}", target),
            }
        }

        if let Err(e) = producer.await {
            warn!("Job producer failed: {}", e);
        }
        for joined in join_all(worker_handles).await {
            if let Err(e) = joined {
                warn!("Worker task failed: {}", e);
            }
        }

        let mut out = out.into_inner();
        let finished = Utc::now();
        for target in &mut out {
            // Invalid targets were finished when they were rejected.
            if !target.normalized.is_empty() {
                target.finished_at = finished;
            }
            target
                .results
                .sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.url.cmp(&b.url)));
        }

        info!(
            "Scan complete: {} results across {} targets",
            out.iter().map(|t| t.results.len()).sum::<usize>(),
            out.len()
        );
        out
    }
}

/// Convenience wrapper: build a [`Scanner`] and run it once.
pub async fn scan_targets(
    targets: &[String],
    config: ScanConfig,
    rules: RuleSet,
    cancel: &CancellationToken,
) -> Result<Vec<TargetResult>, ConfigError> {
    let scanner = Scanner::new(config, rules)?;
    Ok(scanner.scan(targets, cancel).await)
}

async fn execute_job(job: &Job, context: &WorkerContext, cancel: &CancellationToken) -> RequestResult {
    let started = Instant::now();
    let candidate = &job.candidate;
    let url = resolve_path(&job.base, &candidate.path);

    let probe = context.prober.probe(&url, cancel).await;
    let (mut analysis, flags) = analyze(candidate, &probe, &context.rules);

    let mut indexed_exposed = false;
    if let Some(checker) = &context.index_checker {
        let outcome = checker
            .is_indexed(&origin_of(&job.base), &candidate.path)
            .await;
        indexed_exposed = apply_index_check(&mut analysis, &outcome);
    }

    let recommended_fix = recommended_fix(candidate, &analysis, &flags).to_string();

    RequestResult {
        url: probe.url,
        method: probe.method,
        path: candidate.path.clone(),
        status_code: probe.status_code,
        headers: probe.headers,
        snippet: probe.snippet,
        error: probe.error,
        duration_ms: started.elapsed().as_millis() as u64,
        indexed_exposed,
        discovery_source: Some(candidate.source),
        recommended_fix,
        analysis,
    }
}

fn invalid_target_result(raw: &str, error: &TargetError) -> RequestResult {
    RequestResult {
        url: raw.to_string(),
        error: Some(error.to_string()),
        analysis: Analysis {
            severity: Severity::Low,
            reasons: vec![INVALID_TARGET_REASON.to_string()],
            ..Analysis::default()
        },
        ..RequestResult::default()
    }
}
