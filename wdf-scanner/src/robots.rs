//! robots.txt discovery: `Allow`/`Disallow` paths and declared sitemaps.

use crate::error::Result;
use crate::fetch;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_ROBOTS_MAX_BYTES: usize = 1 << 20;

/// What a robots.txt file tells us about the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsDirectives {
    /// `Allow`/`Disallow` path values, first-seen order.
    pub paths: Vec<String>,
    /// `Sitemap:` URLs, first-seen order.
    pub sitemaps: Vec<String>,
}

/// Fetch and parse `/robots.txt` on `base`'s origin. A non-200 answer yields
/// empty directives; transport failures are returned to the caller.
pub async fn fetch_robots(
    client: &Client,
    base: &Url,
    timeout: Duration,
    max_bytes: usize,
    cancel: &CancellationToken,
) -> Result<RobotsDirectives> {
    let mut robots_url = base.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    debug!("Fetching {}", robots_url);
    let request = client
        .get(robots_url.as_str())
        .header("Accept", "text/plain,*/*");
    let response = fetch::send(request, timeout, cancel).await?;

    if response.status().as_u16() != 200 {
        debug!("{} answered {}", robots_url, response.status());
        return Ok(RobotsDirectives::default());
    }

    let max_bytes = if max_bytes == 0 {
        DEFAULT_ROBOTS_MAX_BYTES
    } else {
        max_bytes
    };
    let body = fetch::read_capped(response, max_bytes, cancel).await;
    let directives = parse_robots(&String::from_utf8_lossy(&body));

    info!(
        "robots.txt on {}: {} paths, {} sitemaps",
        base,
        directives.paths.len(),
        directives.sitemaps.len()
    );
    Ok(directives)
}

/// Line-oriented robots.txt parse. Unknown directives are ignored.
pub fn parse_robots(content: &str) -> RobotsDirectives {
    let mut directives = RobotsDirectives::default();
    let mut seen_paths = HashSet::new();
    let mut seen_sitemaps = HashSet::new();

    for line in content.lines() {
        let line = match line.split_once('#') {
            Some((before, _)) => before.trim(),
            None => line.trim(),
        };
        if line.is_empty() {
            continue;
        }

        if let Some(value) = directive_value(line, "disallow:")
            .or_else(|| directive_value(line, "allow:"))
        {
            if value.is_empty() || value == "/" || !value.starts_with('/') {
                continue;
            }
            if seen_paths.insert(value.to_string()) {
                directives.paths.push(value.to_string());
            }
        } else if let Some(value) = directive_value(line, "sitemap:") {
            if value.is_empty() {
                continue;
            }
            if seen_sitemaps.insert(value.to_string()) {
                directives.sitemaps.push(value.to_string());
            }
        }
    }

    directives
}

/// Trimmed value after a case-insensitive `prefix`, if the line starts with it.
fn directive_value<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(line[prefix.len()..].trim())
    } else {
        None
    }
}
