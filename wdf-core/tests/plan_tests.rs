// Tests for path plan building and candidate merging

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wdf_core::config::ScanConfig;
use wdf_core::model::{DiscoverySource, PathCandidate};
use wdf_core::plan::{PlanBuilder, build_path_plan};
use wdf_core::rules::{RuleSet, SensitivePathRule};
use wdf_scanner::fetch::build_client;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn find<'a>(plan: &'a [PathCandidate], p: &str) -> &'a PathCandidate {
    plan.iter()
        .find(|c| c.path == p)
        .unwrap_or_else(|| panic!("{} missing from plan", p))
}

// ============================================================================
// Merge rules
// ============================================================================

#[test]
fn test_duplicate_paths_merge_flags_with_or() {
    let mut builder = PlanBuilder::new();
    builder.add("/admin", DiscoverySource::Dictionary, true, false);
    builder.add("//admin/", DiscoverySource::Robots, false, true);

    let plan = builder.into_plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].path, "/admin");
    assert!(plan[0].is_sensitive);
    assert!(plan[0].critical);
    assert_eq!(plan[0].source, DiscoverySource::Robots);
}

#[test]
fn test_first_discovery_source_wins() {
    let mut builder = PlanBuilder::new();
    builder.add("/blog", DiscoverySource::Dictionary, true, false);
    builder.add("/blog", DiscoverySource::Sitemap, false, false);
    builder.add("/blog", DiscoverySource::Crawler, false, false);
    builder.add("/blog", DiscoverySource::Dictionary, false, false);

    builder.add("/news", DiscoverySource::Robots, false, false);
    builder.add("/news", DiscoverySource::Dictionary, true, true);

    let plan = builder.into_plan();
    assert_eq!(find(&plan, "/blog").source, DiscoverySource::Sitemap);
    let news = find(&plan, "/news");
    assert_eq!(news.source, DiscoverySource::Robots);
    assert!(news.is_sensitive && news.critical);
}

#[test]
fn test_plan_is_sorted_and_unique() {
    let mut builder = PlanBuilder::new();
    for p in ["/z", "/a/b", "/a/./b", "/a", "/m/../z", "a"] {
        builder.add(p, DiscoverySource::Crawler, false, false);
    }
    let paths: Vec<String> = builder.into_plan().into_iter().map(|c| c.path).collect();
    assert_eq!(paths, vec!["/a", "/a/b", "/z"]);
}

#[test]
fn test_discovered_urls_must_share_the_origin() {
    let base = Url::parse("https://example.com/").unwrap();
    let mut builder = PlanBuilder::new();
    let added = builder.add_discovered(
        &base,
        &[
            "https://example.com/docs?page=2".to_string(),
            "https://cdn.example.net/lib.js".to_string(),
            "/relative//path/".to_string(),
        ],
        DiscoverySource::Sitemap,
    );
    assert_eq!(added, 2);
    let paths: Vec<String> = builder.into_plan().into_iter().map(|c| c.path).collect();
    assert_eq!(paths, vec!["/docs", "/relative/path"]);
}

#[test]
fn test_encoded_and_decoded_paths_share_one_candidate() {
    let base = Url::parse("https://example.com/").unwrap();
    let mut builder = PlanBuilder::new();
    builder.add("/my docs", DiscoverySource::Robots, false, false);
    let added = builder.add_discovered(
        &base,
        &[
            "https://example.com/my%20docs".to_string(),
            "/my%20docs/".to_string(),
        ],
        DiscoverySource::Sitemap,
    );
    assert_eq!(added, 2);

    let plan = builder.into_plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].path, "/my docs");
    assert_eq!(plan[0].source, DiscoverySource::Robots);
}

// ============================================================================
// Plans against a live origin
// ============================================================================

fn test_config() -> ScanConfig {
    ScanConfig {
        timeout_secs: 5,
        ..ScanConfig::default()
    }
}

#[tokio::test]
async fn test_dictionary_only_plan() {
    let rules = RuleSet::default_rules().unwrap();
    let client = build_client("wdf-test", Duration::from_secs(5)).unwrap();
    let base = Url::parse("http://127.0.0.1:1/").unwrap();

    let plan = build_path_plan(
        &client,
        &test_config(),
        &rules,
        &base,
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(plan.len(), 26);
    assert!(plan.iter().all(|c| c.source == DiscoverySource::Dictionary));
    assert!(plan.iter().all(|c| c.is_sensitive));
    assert!(plan.windows(2).all(|w| w[0].path < w[1].path));
    assert!(find(&plan, "/.env").critical);
    assert!(!find(&plan, "/robots.txt").critical);
}

#[tokio::test]
async fn test_unreachable_discovery_does_not_break_the_plan() {
    let rules = RuleSet::new(vec![SensitivePathRule::new("/.env", true)], Vec::new());
    let client = build_client("wdf-test", Duration::from_secs(5)).unwrap();
    let base = Url::parse("http://127.0.0.1:1/").unwrap();
    let config = ScanConfig {
        enable_robots: true,
        enable_sitemap: true,
        enable_crawl: true,
        ..test_config()
    };

    let plan = build_path_plan(&client, &config, &rules, &base, &CancellationToken::new()).await;
    // The crawl seed is recorded even though it could not be fetched.
    let paths: Vec<&str> = plan.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["/", "/.env"]);
    assert_eq!(plan[0].source, DiscoverySource::Crawler);
}

#[tokio::test]
async fn test_full_discovery_plan() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nDisallow: /private/\nDisallow: /.env\nSitemap: {uri}/custom.xml\n"
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/custom.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    format!(
                        "<urlset><url><loc>{uri}/blog</loc></url>\
                         <url><loc>{uri}/private</loc></url>\
                         <url><loc>https://other.example/offsite</loc></url></urlset>"
                    ),
                    "application/xml",
                ),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<a href="/about">About</a> <a href="/blog">Blog</a>"#,
                    "text/html; charset=utf-8",
                ),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let rules = RuleSet::default_rules().unwrap();
    let client = build_client("wdf-test", Duration::from_secs(5)).unwrap();
    let base = Url::parse(&uri).unwrap();
    let config = ScanConfig {
        enable_robots: true,
        enable_sitemap: true,
        enable_crawl: true,
        ..test_config()
    };

    let plan = build_path_plan(&client, &config, &rules, &base, &CancellationToken::new()).await;

    let env = find(&plan, "/.env");
    assert_eq!(env.source, DiscoverySource::Robots);
    assert!(env.is_sensitive && env.critical);

    assert_eq!(find(&plan, "/private").source, DiscoverySource::Robots);
    assert!(!find(&plan, "/private").is_sensitive);
    assert_eq!(find(&plan, "/blog").source, DiscoverySource::Sitemap);
    assert_eq!(find(&plan, "/about").source, DiscoverySource::Crawler);
    assert_eq!(find(&plan, "/").source, DiscoverySource::Crawler);
    assert_eq!(find(&plan, "/robots.txt").source, DiscoverySource::Dictionary);
    assert!(!plan.iter().any(|c| c.path == "/offsite"));

    // 26 dictionary paths plus /private, /blog, /about and /.
    assert_eq!(plan.len(), 30);
    assert!(plan.windows(2).all(|w| w[0].path < w[1].path));
}
