//! Sensitive-path dictionary and content patterns.
//!
//! A [`RuleSet`] is built once per scan and handed to the analyzer, so every
//! regex is compiled exactly once.

use crate::model::Severity;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitivePathRule {
    pub path: String,
    pub critical: bool,
}

impl SensitivePathRule {
    pub fn new(path: impl Into<String>, critical: bool) -> Self {
        Self {
            path: path.into(),
            critical,
        }
    }
}

/// A named regex checked against captured snippets.
#[derive(Debug, Clone)]
pub struct ContentPattern {
    pub name: String,
    pub severity: Severity,
    pub regex: Regex,
}

impl ContentPattern {
    pub fn new(name: &str, severity: Severity, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.to_string(),
            severity,
            regex: Regex::new(pattern)?,
        })
    }
}

/// Pattern name that marks a directory listing rather than a secret.
pub const DIRECTORY_LISTING: &str = "Directory listing";

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub sensitive_paths: Vec<SensitivePathRule>,
    pub patterns: Vec<ContentPattern>,
}

const DEFAULT_SENSITIVE_PATHS: &[(&str, bool)] = &[
    ("/.env", true),
    ("/.env.local", true),
    ("/.env.dev", true),
    ("/.env.prod", true),
    ("/.git/config", true),
    ("/.git/HEAD", false),
    ("/.svn/entries", false),
    ("/backup.zip", true),
    ("/backup.tar", true),
    ("/backup.tar.gz", true),
    ("/db.sql", true),
    ("/dump.sql", true),
    ("/database.sql", true),
    ("/phpinfo.php", false),
    ("/swagger/index.html", false),
    ("/swagger-ui.html", false),
    ("/openapi.json", false),
    ("/actuator/env", true),
    ("/actuator/configprops", false),
    ("/actuator/heapdump", true),
    ("/actuator/beans", false),
    ("/server-status", false),
    ("/.DS_Store", false),
    ("/.well-known/security.txt", false),
    // Also discovery seeds; probing them lets indexability fire on the files themselves.
    ("/sitemap.xml", false),
    ("/robots.txt", false),
];

const DEFAULT_PATTERNS: &[(&str, Severity, &str)] = &[
    (DIRECTORY_LISTING, Severity::High, r"(?i)\bIndex of /"),
    ("Password keyword", Severity::Medium, r"(?i)\bpass(word|wd)?\b"),
    ("Credentials keyword", Severity::Medium, r"(?i)\bcredentials?\b"),
    ("AWS access key id", Severity::High, r"\bAKIA[0-9A-Z]{16}\b"),
    (
        "AWS secret access key label",
        Severity::High,
        r"(?i)\baws_secret_access_key\b",
    ),
    ("Google API key", Severity::High, r"\bAIza[0-9A-Za-z\-_]{35}\b"),
    ("GitHub token", Severity::High, r"\bgh[opsu]_[A-Za-z0-9]{36,}\b"),
    ("Slack token", Severity::High, r"\bxox[baprs]-[0-9A-Za-z-]{10,48}\b"),
    ("Stripe live secret key", Severity::High, r"\bsk_live_[0-9a-zA-Z]{20,}\b"),
    (
        "JWT token",
        Severity::High,
        r"\beyJ[a-zA-Z0-9_\-]{10,}\.[a-zA-Z0-9_\-]{10,}\.[a-zA-Z0-9_\-]{10,}\b",
    ),
    (
        "Private key header",
        Severity::High,
        r"(?i)-----BEGIN (RSA|EC|OPENSSH) PRIVATE KEY-----",
    ),
    (
        "Database connection string",
        Severity::High,
        r#"(?i)\b(postgres(ql)?|mysql|mssql|mongodb(\+srv)?|redis)://[^\s"'<>]+"#,
    ),
    (
        "GCP service account marker",
        Severity::High,
        r#"(?i)"type"\s*:\s*"service_account""#,
    ),
    (".git keyword", Severity::Medium, r"(?i)\.git"),
    ("Generic api key label", Severity::Medium, r"(?i)\bapi[_-]?key\b"),
];

impl RuleSet {
    pub fn new(sensitive_paths: Vec<SensitivePathRule>, patterns: Vec<ContentPattern>) -> Self {
        Self {
            sensitive_paths,
            patterns,
        }
    }

    /// The built-in dictionary and pattern table.
    pub fn default_rules() -> Result<Self, regex::Error> {
        let sensitive_paths = DEFAULT_SENSITIVE_PATHS
            .iter()
            .map(|&(path, critical)| SensitivePathRule::new(path, critical))
            .collect();
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|&(name, severity, pattern)| ContentPattern::new(name, severity, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(sensitive_paths, patterns))
    }
}
