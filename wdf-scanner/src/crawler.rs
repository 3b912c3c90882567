use crate::error::{Result, ScanError};
use crate::fetch;
use crate::normalize::same_host;
use regex::Regex;
use reqwest::Client;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const MAX_CRAWL_DEPTH: usize = 2;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const DEFAULT_PAGE_MAX_BYTES: usize = 256 << 10;

static LINK_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\b(?:href|src)\s*=\s*(?:"([^"]+)"|'([^']+)')"#)
        .expect("link attribute pattern is valid")
});

const SKIPPED_SCHEMES: [&str; 4] = ["mailto:", "javascript:", "data:", "tel:"];

/// Lightweight same-origin HTML crawler used for path discovery.
///
/// Pages are fetched breadth-first, one at a time. Links are pulled out of
/// `href`/`src` attributes by text scanning rather than by building a DOM.
pub struct SameOriginCrawler {
    client: Client,
    max_depth: usize,
    page_limit: usize,
    max_bytes: usize,
    timeout: Duration,
}

impl SameOriginCrawler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_depth: MAX_CRAWL_DEPTH,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_bytes: DEFAULT_PAGE_MAX_BYTES,
            timeout: Duration::from_secs(10),
        }
    }

    /// Depth 0 means the default; anything deeper than 2 is clamped.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = if depth == 0 {
            MAX_CRAWL_DEPTH
        } else {
            depth.min(MAX_CRAWL_DEPTH)
        };
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit };
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = if max_bytes == 0 {
            DEFAULT_PAGE_MAX_BYTES
        } else {
            max_bytes
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Crawl from `origin` and return every same-origin URL seen, visited or
    /// merely linked, in sorted order.
    pub async fn crawl(&self, origin: &Url, cancel: &CancellationToken) -> Result<Vec<String>> {
        info!(
            "Starting crawl of {} (depth {}, page limit {})",
            origin, self.max_depth, self.page_limit
        );

        if origin.cannot_be_a_base() || origin.host_str().is_none() {
            return Err(ScanError::InvalidUrl(origin.to_string()));
        }

        let mut start = origin.clone();
        start.set_fragment(None);
        start.set_query(None);

        let mut visited: HashSet<String> = HashSet::new();
        let mut discovered: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();
        queue.push_back((start, 0));

        while visited.len() < self.page_limit {
            let Some((page, depth)) = queue.pop_front() else {
                break;
            };
            if cancel.is_cancelled() {
                debug!("Crawl of {} cancelled", origin);
                break;
            }

            let canonical = canonical_url(&page);
            if !visited.insert(canonical.clone()) {
                continue;
            }
            discovered.insert(canonical.clone());

            let body = match self.fetch_html(&canonical, cancel).await {
                Ok(Some(body)) => body,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Crawl error for {}: {}", canonical, e);
                    continue;
                }
            };

            for link in extract_links(&body) {
                let Some(resolved) = resolve_same_origin(&page, origin, &link) else {
                    debug!("  -> {} is off-origin or unresolvable, skipping", link);
                    continue;
                };
                let link_canonical = canonical_url(&resolved);
                discovered.insert(link_canonical.clone());
                if depth + 1 <= self.max_depth && !visited.contains(&link_canonical) {
                    queue.push_back((resolved, depth + 1));
                }
            }
        }

        info!(
            "Crawl complete. Visited {} pages, discovered {} URLs",
            visited.len(),
            discovered.len()
        );
        Ok(discovered.into_iter().collect())
    }

    /// Body of an HTML page, or `None` when the page is not a 200 HTML answer.
    async fn fetch_html(&self, url: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        debug!("Fetching {}", url);
        let request = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,*/*");
        let response = fetch::send(request, self.timeout, cancel).await?;

        let is_html = fetch::header_value(&response, "content-type")
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(false);
        if response.status().as_u16() != 200 || !is_html {
            debug!("{} is not a 200 HTML page, not parsing", url);
            return Ok(None);
        }

        let body = fetch::read_capped(response, self.max_bytes, cancel).await;
        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }
}

/// Raw `href`/`src` values, minus mail/script/data/phone targets.
pub fn extract_links(html: &str) -> Vec<String> {
    LINK_ATTR
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| {
            let lower = v.to_ascii_lowercase();
            !SKIPPED_SCHEMES.iter().any(|s| lower.starts_with(s))
        })
        .collect()
}

/// Resolve `href` against the page it appeared on, keeping it only when it
/// stays on `origin`'s scheme and host.
fn resolve_same_origin(page: &Url, origin: &Url, href: &str) -> Option<Url> {
    let mut resolved = page.join(href).ok()?;
    resolved.set_fragment(None);
    resolved.set_query(None);

    if resolved.scheme() != origin.scheme() || !same_host(&resolved, origin) {
        return None;
    }
    Some(resolved)
}

fn canonical_url(url: &Url) -> String {
    let mut c = url.clone();
    c.set_fragment(None);
    c.set_query(None);
    if c.path().is_empty() {
        c.set_path("/");
    }
    c.to_string()
}
