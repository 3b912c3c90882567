//! sitemap.xml discovery, following sitemap indexes breadth-first.

use crate::fetch;
use crate::normalize::same_host;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_SITEMAP_MAX_BYTES: usize = 2 << 20;
pub const DEFAULT_SITEMAP_MAX_FETCH: usize = 50;

/// Root element and `<loc>` values of one sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    pub root: Option<String>,
    pub locs: Vec<String>,
}

impl SitemapDocument {
    pub fn is_index(&self) -> bool {
        self.root
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("sitemapindex"))
    }
}

/// Limits for one sitemap walk.
#[derive(Debug, Clone)]
pub struct SitemapLimits {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub max_fetch: usize,
}

impl Default for SitemapLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_bytes: DEFAULT_SITEMAP_MAX_BYTES,
            max_fetch: DEFAULT_SITEMAP_MAX_FETCH,
        }
    }
}

/// Walk the sitemap queue seeded with `seeds` and return every same-origin
/// page URL found (query and fragment stripped), first-seen order.
///
/// Sitemap indexes enqueue their same-origin children. Unreachable, non-200
/// or malformed sitemaps are skipped; the walk stops after
/// `limits.max_fetch` dequeued sitemaps.
pub async fn fetch_sitemaps(
    client: &Client,
    base: &Url,
    seeds: &[String],
    limits: &SitemapLimits,
    cancel: &CancellationToken,
) -> Vec<String> {
    let max_fetch = if limits.max_fetch == 0 {
        DEFAULT_SITEMAP_MAX_FETCH
    } else {
        limits.max_fetch
    };
    let max_bytes = if limits.max_bytes == 0 {
        DEFAULT_SITEMAP_MAX_BYTES
    } else {
        limits.max_bytes
    };

    let mut seen_sitemaps: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<Url> = VecDeque::new();
    for seed in seeds {
        let seed = seed.trim();
        if seed.is_empty() {
            continue;
        }
        let Ok(url) = base.join(seed) else {
            debug!("Skipping unparseable sitemap seed {}", seed);
            continue;
        };
        if seen_sitemaps.insert(url.to_string()) {
            queue.push_back(url);
        }
    }

    let mut found = Vec::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut fetched = 0;

    while let Some(sitemap_url) = queue.pop_front() {
        if fetched >= max_fetch || cancel.is_cancelled() {
            break;
        }
        fetched += 1;

        debug!("Fetching sitemap {}", sitemap_url);
        let request = client
            .get(sitemap_url.as_str())
            .header("Accept", "application/xml,text/xml,*/*");
        let response = match fetch::send(request, limits.timeout, cancel).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Sitemap fetch failed for {}: {}", sitemap_url, e);
                continue;
            }
        };
        if response.status().as_u16() != 200 {
            debug!("{} answered {}", sitemap_url, response.status());
            continue;
        }

        let body = fetch::read_capped(response, max_bytes, cancel).await;
        let document = parse_sitemap_xml(&body);

        if document.is_index() {
            for loc in &document.locs {
                let Some(child) = resolve_same_origin(&sitemap_url, base, loc) else {
                    continue;
                };
                if seen_sitemaps.insert(child.to_string()) {
                    queue.push_back(child);
                }
            }
            continue;
        }

        for loc in &document.locs {
            let Some(mut page) = resolve_same_origin(&sitemap_url, base, loc) else {
                continue;
            };
            page.set_fragment(None);
            page.set_query(None);
            let canonical = page.to_string();
            if seen_urls.insert(canonical.clone()) {
                found.push(canonical);
            }
        }
    }

    info!(
        "Sitemap walk for {}: {} sitemaps fetched, {} URLs",
        base,
        fetched,
        found.len()
    );
    found
}

fn resolve_same_origin(sitemap_url: &Url, base: &Url, loc: &str) -> Option<Url> {
    let loc = loc.trim();
    if loc.is_empty() {
        return None;
    }
    let url = sitemap_url.join(loc).ok()?;
    same_host(&url, base).then_some(url)
}

/// Stream the XML events for the root element name and every `<loc>` text.
/// Malformed input ends the parse but keeps what was read so far.
pub fn parse_sitemap_xml(xml: &[u8]) -> SitemapDocument {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut document = SitemapDocument::default();
    let mut in_loc = false;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name.eq_ignore_ascii_case("loc") {
                    in_loc = true;
                    text.clear();
                }
                if document.root.is_none() {
                    document.root = Some(name);
                }
            }
            Ok(Event::Empty(e)) => {
                if document.root.is_none() {
                    document.root =
                        Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            }
            Ok(Event::Text(e)) if in_loc => match e.unescape() {
                Ok(t) => text.push_str(&t),
                Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
            },
            Ok(Event::CData(e)) if in_loc => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => {
                if in_loc && e.local_name().as_ref().eq_ignore_ascii_case(b"loc") {
                    in_loc = false;
                    document.locs.push(text.trim().to_string());
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("Sitemap XML parse stopped: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    document
}
