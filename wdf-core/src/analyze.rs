//! Severity classification for one probe response.

use crate::model::{Analysis, AnalysisFlags, PathCandidate, Severity};
use crate::rules::{DIRECTORY_LISTING, RuleSet};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use wdf_scanner::result::header_values;
use wdf_scanner::ProbeResult;

static META_ROBOTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+name\s*=\s*["']robots["'][^>]*>"#)
        .expect("meta robots pattern is valid")
});

static CONTENT_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bcontent\s*=\s*["']([^"']+)["']"#).expect("content attribute pattern is valid")
});

pub const REASON_CRITICAL_200: &str = "200 OK on critical sensitive path";
pub const REASON_SENSITIVE_200: &str = "200 OK on sensitive path";
pub const REASON_DIRECTORY_LISTING: &str = "directory listing detected";
pub const REASON_ATTACHMENT: &str = "downloadable attachment response";
pub const REASON_HEADER_NOINDEX: &str = "X-Robots-Tag indicates noindex";
pub const REASON_META_NOINDEX: &str = "meta robots indicates noindex";
pub const REASON_DOWNGRADED: &str = "severity downgraded due to explicit noindex";
pub const REASON_INDEXED: &str = "indexed in search engine";

/// Classify a probe of `candidate`.
///
/// Rules only ever raise severity, except for a single one-step downgrade when
/// the response says noindex. Directory listings and confirmed secrets are
/// never downgraded.
pub fn analyze(
    candidate: &PathCandidate,
    probe: &ProbeResult,
    rules: &RuleSet,
) -> (Analysis, AnalysisFlags) {
    let mut analysis = Analysis::default();
    let mut flags = AnalysisFlags::default();
    let mut reasons: Vec<String> = Vec::new();
    let mut matched: Vec<String> = Vec::new();
    let snippet = probe.snippet.as_str();

    if candidate.is_sensitive && probe.status_code == 200 {
        if candidate.critical {
            analysis.severity = Severity::High;
            reasons.push(REASON_CRITICAL_200.to_string());
        } else {
            analysis.severity = Severity::Medium;
            reasons.push(REASON_SENSITIVE_200.to_string());
        }
        analysis.interesting = true;
    }

    if !snippet.is_empty() {
        for pattern in rules.patterns.iter().filter(|p| p.regex.is_match(snippet)) {
            matched.push(pattern.name.clone());
            reasons.push(format!("matched pattern: {}", pattern.name));
            analysis.interesting = true;

            if pattern.name == DIRECTORY_LISTING {
                flags.directory_listing = true;
            } else if pattern.severity == Severity::High {
                flags.confirmed_secret = true;
            }
            analysis.severity = analysis.severity.max(pattern.severity);
        }
    }

    // Catches listings whose heading fell outside the regex's reach.
    if snippet.to_ascii_lowercase().contains("index of /") {
        flags.directory_listing = true;
        analysis.interesting = true;
        analysis.severity = Severity::High;
        reasons.push(REASON_DIRECTORY_LISTING.to_string());
    }

    let headers = &probe.headers;
    if header_values(headers, "content-disposition")
        .iter()
        .any(|v| v.to_ascii_lowercase().contains("attachment"))
    {
        analysis.severity = analysis.severity.max(Severity::Medium);
        analysis.interesting = true;
        reasons.push(REASON_ATTACHMENT.to_string());
    }

    if header_values(headers, "x-robots-tag")
        .iter()
        .any(|v| has_noindex_directive(v))
    {
        flags.no_index = true;
        reasons.push(REASON_HEADER_NOINDEX.to_string());
    }

    if has_meta_noindex(snippet) {
        flags.no_index = true;
        reasons.push(REASON_META_NOINDEX.to_string());
    }

    if flags.no_index && !flags.confirmed_secret && !flags.directory_listing {
        let downgraded = analysis.severity.downgrade();
        if downgraded != analysis.severity {
            analysis.severity = downgraded;
            reasons.push(REASON_DOWNGRADED.to_string());
        }
    }

    analysis.reasons = dedupe(reasons);
    analysis.matched_patterns = dedupe(matched);
    (analysis, flags)
}

/// Fold an indexability answer into an analysis. Returns whether the path is
/// exposed in a search index.
pub fn apply_index_check(analysis: &mut Analysis, outcome: &anyhow::Result<bool>) -> bool {
    match outcome {
        Ok(true) => {
            analysis.severity = Severity::High;
            analysis.interesting = true;
            analysis.reasons.push(REASON_INDEXED.to_string());
            analysis.reasons = dedupe(std::mem::take(&mut analysis.reasons));
            true
        }
        Ok(false) => false,
        Err(e) => {
            analysis.reasons.push(format!("index check error: {e}"));
            analysis.reasons = dedupe(std::mem::take(&mut analysis.reasons));
            false
        }
    }
}

/// True when a comma-separated robots directive list contains `noindex` or
/// `none`, case-insensitively.
pub fn has_noindex_directive(value: &str) -> bool {
    value
        .split(',')
        .map(|d| d.trim())
        .any(|d| d.eq_ignore_ascii_case("noindex") || d.eq_ignore_ascii_case("none"))
}

/// True when the first `<meta name="robots">` tag carries a noindex directive.
pub fn has_meta_noindex(html: &str) -> bool {
    if html.is_empty() {
        return false;
    }
    let Some(tag) = META_ROBOTS.find(html) else {
        return false;
    };
    CONTENT_ATTR
        .captures(tag.as_str())
        .and_then(|c| c.get(1))
        .is_some_and(|content| has_noindex_directive(content.as_str()))
}

/// Trim, drop empties and exact duplicates, keep first-seen order.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noindex_directive_parsing() {
        assert!(has_noindex_directive("noindex"));
        assert!(has_noindex_directive(" NoFollow , NOINDEX "));
        assert!(has_noindex_directive("none"));
        assert!(!has_noindex_directive("nofollow"));
        assert!(!has_noindex_directive("noindexing"));
        assert!(!has_noindex_directive(""));
    }

    #[test]
    fn test_meta_noindex() {
        assert!(has_meta_noindex(
            r#"<head><META NAME="robots" content="noindex, nofollow"></head>"#
        ));
        assert!(has_meta_noindex(
            "<meta\n  name='robots'\n  content='none'\n/>"
        ));
        assert!(!has_meta_noindex(
            r#"<meta name="description" content="noindex">"#
        ));
        assert!(!has_meta_noindex(r#"<meta name="robots" content="index">"#));
        assert!(!has_meta_noindex(""));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let out = dedupe(vec![
            " b ".to_string(),
            "a".to_string(),
            "b".to_string(),
            "".to_string(),
            "   ".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(out, vec!["b", "a"]);
    }

    #[test]
    fn test_index_check_overrides_downgrade() {
        let mut analysis = Analysis {
            severity: Severity::Low,
            reasons: vec![REASON_DOWNGRADED.to_string()],
            ..Default::default()
        };
        assert!(apply_index_check(&mut analysis, &Ok(true)));
        assert_eq!(analysis.severity, Severity::High);
        assert!(analysis.interesting);
        assert_eq!(analysis.reasons.last().map(String::as_str), Some(REASON_INDEXED));
    }

    #[test]
    fn test_index_check_error_is_informational() {
        let mut analysis = Analysis::default();
        let outcome: anyhow::Result<bool> = Err(anyhow::anyhow!("quota exceeded"));
        assert!(!apply_index_check(&mut analysis, &outcome));
        assert_eq!(analysis.severity, Severity::Low);
        assert!(!analysis.interesting);
        assert_eq!(analysis.reasons, vec!["index check error: quota exceeded"]);
    }
}
