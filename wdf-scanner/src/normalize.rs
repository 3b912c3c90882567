//! Canonicalization of scan targets, candidate paths and discovered URLs.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::{ParseError, Url};

/// Why a raw target string could not be turned into a scannable origin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty target")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,

    #[error("invalid target URL: {0}")]
    Parse(#[from] ParseError),
}

/// A target that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTarget {
    pub normalized: String,
    pub url: Url,
}

/// Canonicalize a path: leading slash, forward slashes only, no repeated
/// slashes, `.`/`..` resolved. Returns `None` only for empty input.
pub fn normalize_path(p: &str) -> Option<String> {
    let p = p.trim();
    if p.is_empty() {
        return None;
    }

    let unified = p.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

/// Validate and canonicalize a user supplied target. Targets without a
/// scheme default to https.
pub fn normalize_target(raw: &str) -> Result<NormalizedTarget, TargetError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TargetError::Empty);
    }

    let with_scheme = if s.contains("://") {
        s.to_string()
    } else {
        format!("https://{}", s)
    };

    let mut url = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(ParseError::EmptyHost) => return Err(TargetError::MissingHost),
        Err(e) => return Err(TargetError::Parse(e)),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(TargetError::MissingHost);
    }

    url.set_fragment(None);
    if url.path().is_empty() {
        url.set_path("/");
    }

    Ok(NormalizedTarget {
        normalized: url.to_string(),
        url,
    })
}

/// True when both URLs name the same host (case-insensitive) and port.
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => ha.eq_ignore_ascii_case(hb) && a.port() == b.port(),
        _ => false,
    }
}

/// Reduce a discovered URL or bare path to a normalized path on `base`'s
/// origin. URLs pointing at another host are rejected.
pub fn normalize_url_to_same_origin_path(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match Url::parse(raw) {
        Ok(u) => {
            if u.cannot_be_a_base() {
                return None;
            }
            if u.host_str().is_some() && !same_host(&u, base) {
                return None;
            }
            let path = if u.path().is_empty() { "/" } else { u.path() };
            normalize_path(&decode_path(path))
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            let path = raw.split(['?', '#']).next().unwrap_or_default();
            if path.starts_with("//") {
                // Protocol-relative reference; carries a host.
                let absolute = base.join(raw).ok()?;
                return normalize_url_to_same_origin_path(base, absolute.as_str());
            }
            if path.is_empty() {
                return Some("/".to_string());
            }
            normalize_path(&decode_path(path))
        }
        Err(_) => None,
    }
}

/// Percent-decoded form of a URL path, so `/my%20docs` and `/my docs` key
/// the same candidate.
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Absolute URL for `path` on the origin of `base`.
pub fn resolve_path(base: &Url, path: &str) -> String {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// `scheme://host[:port]` of a URL.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
