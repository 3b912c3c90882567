use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Risk label for one probed path. Declaration order is the ranking.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// One step down; `Low` stays `Low`.
    pub fn downgrade(self) -> Self {
        match self {
            Severity::High => Severity::Medium,
            Severity::Medium | Severity::Low => Severity::Low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverySource {
    Dictionary,
    Robots,
    Sitemap,
    Crawler,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::Dictionary => "dictionary",
            DiscoverySource::Robots => "robots",
            DiscoverySource::Sitemap => "sitemap",
            DiscoverySource::Crawler => "crawler",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized path queued for probing on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCandidate {
    pub path: String,
    pub is_sensitive: bool,
    pub critical: bool,
    pub source: DiscoverySource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_patterns: Vec<String>,
    pub interesting: bool,
}

/// Signals from analysis that drive remediation but are not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisFlags {
    pub no_index: bool,
    pub directory_listing: bool,
    pub confirmed_secret: bool,
}

fn is_zero(v: &u16) -> bool {
    *v == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub url: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub indexed_exposed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_source: Option<DiscoverySource>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommended_fix: String,
    pub analysis: Analysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub target: String,
    pub normalized: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<RequestResult>,
}

impl TargetResult {
    pub fn findings(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.iter().filter(|r| r.analysis.interesting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Low.max(Severity::High), Severity::High);
    }

    #[test]
    fn test_severity_downgrade_is_one_step() {
        assert_eq!(Severity::High.downgrade(), Severity::Medium);
        assert_eq!(Severity::Medium.downgrade(), Severity::Low);
        assert_eq!(Severity::Low.downgrade(), Severity::Low);
    }

    #[test]
    fn test_request_result_omits_empty_fields() {
        let r = RequestResult {
            url: "https://example.com/.env".to_string(),
            method: "HEAD".to_string(),
            path: "/.env".to_string(),
            duration_ms: 12,
            discovery_source: Some(DiscoverySource::Dictionary),
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        let obj = v.as_object().unwrap();

        assert!(!obj.contains_key("status_code"));
        assert!(!obj.contains_key("headers"));
        assert!(!obj.contains_key("snippet"));
        assert!(!obj.contains_key("error"));
        assert!(!obj.contains_key("recommended_fix"));
        assert_eq!(obj["discovery_source"], "dictionary");
        assert_eq!(obj["duration_ms"], 12);
        assert_eq!(obj["indexed_exposed"], false);
        assert_eq!(obj["analysis"]["severity"], "low");
        assert!(obj["analysis"].get("reasons").is_none());
    }
}
