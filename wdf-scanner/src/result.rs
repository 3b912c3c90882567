use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Raw outcome of probing one URL, before any analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub method: String,
    /// 0 when no response was received.
    pub status_code: u16,
    /// Lower-cased header names, all values kept.
    pub headers: BTreeMap<String, Vec<String>>,
    pub snippet: String,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ProbeResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            method: "HEAD".to_string(),
            status_code: 0,
            headers: BTreeMap::new(),
            snippet: String::new(),
            error: None,
            duration: Duration::from_secs(0),
        }
    }

    pub fn with_error(url: String, method: &str, error: String) -> Self {
        Self {
            method: method.to_string(),
            error: Some(error),
            ..Self::new(url)
        }
    }

    /// All values of a header, matched case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        header_values(&self.headers, name)
    }
}

/// All values of `name` in a header map, matched case-insensitively.
pub fn header_values<'a>(headers: &'a BTreeMap<String, Vec<String>>, name: &str) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .flat_map(|(_, values)| values.iter().map(String::as_str))
        .collect()
}
