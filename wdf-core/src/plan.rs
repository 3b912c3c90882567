//! Per-target path plan: dictionary rules merged with discovery output.

use crate::config::ScanConfig;
use crate::model::{DiscoverySource, PathCandidate};
use crate::rules::RuleSet;
use reqwest::Client;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use wdf_scanner::crawler::{DEFAULT_PAGE_MAX_BYTES, SameOriginCrawler};
use wdf_scanner::normalize::{
    decode_path, normalize_path, normalize_url_to_same_origin_path, resolve_path,
};
use wdf_scanner::robots::{DEFAULT_ROBOTS_MAX_BYTES, fetch_robots};
use wdf_scanner::sitemap::{SitemapLimits, fetch_sitemaps};

pub const MAX_PATH_LEN: usize = 2048;

/// Deduplicating accumulator for candidate paths.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    seen: BTreeMap<String, PathCandidate>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert `path`, merging with an existing entry.
    /// Returns false when the path was rejected.
    pub fn add(
        &mut self,
        path: &str,
        source: DiscoverySource,
        is_sensitive: bool,
        critical: bool,
    ) -> bool {
        let Some(normalized) = normalize_path(path) else {
            return false;
        };
        if normalized.len() > MAX_PATH_LEN {
            debug!("Dropping over-long candidate ({} bytes)", normalized.len());
            return false;
        }

        match self.seen.get_mut(&normalized) {
            Some(existing) => {
                existing.is_sensitive |= is_sensitive;
                existing.critical |= critical;
                existing.source = merge_source(existing.source, source);
            }
            None => {
                self.seen.insert(
                    normalized.clone(),
                    PathCandidate {
                        path: normalized,
                        is_sensitive,
                        critical,
                        source,
                    },
                );
            }
        }
        true
    }

    pub fn add_rules(&mut self, rules: &RuleSet) {
        for rule in &rules.sensitive_paths {
            self.add(&rule.path, DiscoverySource::Dictionary, true, rule.critical);
        }
    }

    /// Add discovered URLs that resolve to a path on `base`'s origin.
    pub fn add_discovered(&mut self, base: &Url, urls: &[String], source: DiscoverySource) -> usize {
        urls.iter()
            .filter_map(|u| normalize_url_to_same_origin_path(base, u))
            .filter(|p| self.add(p, source, false, false))
            .count()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Candidates sorted lexicographically by path.
    pub fn into_plan(self) -> Vec<PathCandidate> {
        self.seen.into_values().collect()
    }
}

/// A dictionary entry takes the first discovery source that touches it;
/// after that the source is fixed.
pub fn merge_source(prev: DiscoverySource, next: DiscoverySource) -> DiscoverySource {
    if prev == DiscoverySource::Dictionary && next != DiscoverySource::Dictionary {
        next
    } else {
        prev
    }
}

/// Build the plan for one target: dictionary first, then robots, sitemap and
/// crawler output when enabled. Discovery failures only shrink the plan.
pub async fn build_path_plan(
    client: &Client,
    config: &ScanConfig,
    rules: &RuleSet,
    base: &Url,
    cancel: &CancellationToken,
) -> Vec<PathCandidate> {
    let mut builder = PlanBuilder::new();
    builder.add_rules(rules);

    let mut robots_sitemaps = Vec::new();
    if config.enable_robots {
        match fetch_robots(client, base, config.timeout(), DEFAULT_ROBOTS_MAX_BYTES, cancel).await {
            Ok(directives) => {
                for path in &directives.paths {
                    builder.add(&decode_path(path), DiscoverySource::Robots, false, false);
                }
                robots_sitemaps = directives.sitemaps;
            }
            Err(e) => warn!("robots.txt discovery failed for {}: {}", base, e),
        }
    }

    if config.enable_sitemap {
        let mut seeds = vec![resolve_path(base, "/sitemap.xml")];
        seeds.extend(robots_sitemaps);
        let limits = SitemapLimits {
            timeout: config.timeout(),
            ..SitemapLimits::default()
        };
        let urls = fetch_sitemaps(client, base, &seeds, &limits, cancel).await;
        let added = builder.add_discovered(base, &urls, DiscoverySource::Sitemap);
        debug!("Sitemap contributed {} of {} URLs for {}", added, urls.len(), base);
    }

    if config.enable_crawl {
        let crawler = SameOriginCrawler::new(client.clone())
            .with_max_depth(config.effective_crawl_depth())
            .with_page_limit(config.effective_crawl_limit())
            .with_max_bytes(DEFAULT_PAGE_MAX_BYTES)
            .with_timeout(config.timeout());
        match crawler.crawl(base, cancel).await {
            Ok(urls) => {
                let added = builder.add_discovered(base, &urls, DiscoverySource::Crawler);
                debug!("Crawler contributed {} of {} URLs for {}", added, urls.len(), base);
            }
            Err(e) => warn!("Crawl failed for {}: {}", base, e),
        }
    }

    info!("Planned {} paths for {}", builder.len(), base);
    builder.into_plan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_source() {
        use DiscoverySource::*;
        assert_eq!(merge_source(Dictionary, Robots), Robots);
        assert_eq!(merge_source(Dictionary, Dictionary), Dictionary);
        assert_eq!(merge_source(Robots, Sitemap), Robots);
        assert_eq!(merge_source(Sitemap, Dictionary), Sitemap);
        assert_eq!(merge_source(Crawler, Robots), Crawler);
    }

    #[test]
    fn test_add_rejects_empty_and_long_paths() {
        let mut builder = PlanBuilder::new();
        assert!(!builder.add("   ", DiscoverySource::Crawler, false, false));
        let long = format!("/{}", "a".repeat(MAX_PATH_LEN));
        assert!(!builder.add(&long, DiscoverySource::Crawler, false, false));
        let fits = format!("/{}", "a".repeat(MAX_PATH_LEN - 1));
        assert!(builder.add(&fits, DiscoverySource::Crawler, false, false));
        assert_eq!(builder.len(), 1);
    }
}
