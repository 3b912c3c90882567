// Report structure, JSON output and the grouped console view

use crate::config::ScanConfig;
use crate::model::{RequestResult, Severity, TargetResult};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub config: ScanConfig,
    pub targets: Vec<TargetResult>,
}

impl Report {
    pub fn new(config: ScanConfig, targets: Vec<TargetResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            config,
            targets,
        }
    }
}

/// Indented JSON followed by a newline.
pub fn write_json<W: Write>(mut writer: W, report: &Report) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

const PATH_WIDTH: usize = 30;

/// Human-readable view: interesting results per target, grouped by severity,
/// then a per-target summary.
pub fn generate_pretty_report(report: &Report, color: bool) -> String {
    let mut out = String::new();
    let rule = "-".repeat(60);

    for target in &report.targets {
        let header = format!("SCAN TARGET: {}", target.normalized);
        if color {
            out.push_str(&header.bold().to_string());
        } else {
            out.push_str(&header);
        }
        out.push('\n');
        out.push_str(&rule);
        out.push_str("\n\n");

        let findings: Vec<&RequestResult> = target.findings().collect();
        for severity in [Severity::High, Severity::Medium, Severity::Low] {
            let mut group: Vec<&RequestResult> = findings
                .iter()
                .copied()
                .filter(|r| r.analysis.severity == severity)
                .collect();
            if group.is_empty() {
                continue;
            }
            group.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.url.cmp(&b.url)));

            out.push_str(&format!("[{}]\n", severity_label(severity, color)));
            for r in group {
                let mut note = note_for_result(r);
                if let Some(source) = r.discovery_source {
                    note = format!("{} [{}]", note, source).trim().to_string();
                }
                out.push_str(&format!(
                    "  {:<width$} {:<5} {}\n",
                    r.path,
                    r.status_code,
                    note,
                    width = PATH_WIDTH
                ));
            }
            out.push('\n');
        }

        out.push_str(&rule);
        out.push('\n');
        out.push_str(&summary(target, &findings));
        out.push('\n');
    }

    out
}

fn severity_label(severity: Severity, color: bool) -> String {
    let label = severity.as_str().to_uppercase();
    if !color {
        return label;
    }
    match severity {
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.cyan().to_string(),
    }
}

fn summary(target: &TargetResult, findings: &[&RequestResult]) -> String {
    let count = |s: Severity| findings.iter().filter(|r| r.analysis.severity == s).count();
    let elapsed = (target.finished_at - target.started_at)
        .to_std()
        .unwrap_or_default();

    let mut out = String::from("SUMMARY:\n");
    out.push_str(&format!("  High: {}\n", count(Severity::High)));
    out.push_str(&format!("  Medium: {}\n", count(Severity::Medium)));
    out.push_str(&format!("  Low: {}\n", count(Severity::Low)));
    out.push_str(&format!("  Total Findings: {}\n", findings.len()));
    out.push_str(&format!(
        "  Scan Duration: {}\n",
        format_duration(elapsed.as_secs_f64())
    ));
    out
}

fn note_for_result(r: &RequestResult) -> String {
    if let Some(error) = &r.error {
        return format!("Error: {}", error);
    }
    if let Some(reason) = r.analysis.reasons.first() {
        return humanize_reason(&r.path, r.status_code, reason);
    }
    status_text(r.status_code)
}

/// Short operator-facing wording for the first reason on a result.
pub fn humanize_reason(path: &str, status: u16, reason: &str) -> String {
    let lp = path.to_ascii_lowercase();
    let lr = reason.to_ascii_lowercase();

    let text = if status == 200 && lp.starts_with("/.env") {
        "Sensitive config exposed"
    } else if status == 200 && lp.starts_with("/.git/") {
        "Git metadata exposed"
    } else if status == 200 && (lp.contains("swagger") || lp.contains("openapi")) {
        "Public API documentation"
    } else if lr.contains("directory listing") {
        "Directory listing enabled"
    } else if lr.contains("matched pattern") {
        "Secret pattern detected"
    } else if lr.contains("200 ok") {
        "Sensitive content exposed"
    } else {
        reason
    };
    text.to_string()
}

fn status_text(code: u16) -> String {
    match code {
        0 => String::new(),
        200 => "OK".to_string(),
        301 => "Moved Permanently".to_string(),
        302 => "Found".to_string(),
        401 => "Unauthorized".to_string(),
        403 => "Forbidden".to_string(),
        404 => "Not Found".to_string(),
        405 => "Method Not Allowed".to_string(),
        429 => "Too Many Requests".to_string(),
        500 => "Internal Server Error".to_string(),
        _ => format!("HTTP {}", code),
    }
}

fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0);
    if secs < 10.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}s", secs)
    }
}
