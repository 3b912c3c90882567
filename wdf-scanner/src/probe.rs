//! HTTP access layer: one read-only probe per candidate URL.

use crate::error::{Result, ScanError};
use crate::fetch;
use crate::result::ProbeResult;
use reqwest::{Client, Method, Response};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_MAX_SNIPPET: usize = 2048;
pub const NON_TEXT_MARKER: &str = "[non-text content]";

/// Issues HEAD first and falls back to GET when the server refuses HEAD or
/// when a 200 makes the body worth reading.
#[derive(Clone)]
pub struct Prober {
    client: Client,
    timeout: Duration,
    max_snippet: usize,
}

impl Prober {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            max_snippet: DEFAULT_MAX_SNIPPET,
        }
    }

    pub fn with_max_snippet(mut self, max_snippet: usize) -> Self {
        self.max_snippet = if max_snippet == 0 {
            DEFAULT_MAX_SNIPPET
        } else {
            max_snippet
        };
        self
    }

    pub async fn probe(&self, url: &str, cancel: &CancellationToken) -> ProbeResult {
        let started = Instant::now();

        let mut result = match self.request(Method::HEAD, url, cancel).await {
            Ok(response) => match response.status().as_u16() {
                405 | 501 => {
                    debug!("{} refused HEAD, retrying with GET", url);
                    self.get(url, cancel).await
                }
                200 => self.get(url, cancel).await,
                status => {
                    let mut result = ProbeResult::new(url.to_string());
                    result.status_code = status;
                    result.headers = collect_headers(&response);
                    result
                }
            },
            Err(ScanError::Cancelled) => {
                ProbeResult::with_error(url.to_string(), "HEAD", ScanError::Cancelled.to_string())
            }
            Err(e) => {
                debug!("HEAD {} failed ({}), retrying with GET", url, e);
                self.get(url, cancel).await
            }
        };

        result.duration = started.elapsed();
        result
    }

    async fn get(&self, url: &str, cancel: &CancellationToken) -> ProbeResult {
        let response = match self.request(Method::GET, url, cancel).await {
            Ok(response) => response,
            Err(e) => return ProbeResult::with_error(url.to_string(), "GET", e.to_string()),
        };

        let mut result = ProbeResult::new(url.to_string());
        result.method = "GET".to_string();
        result.status_code = response.status().as_u16();
        result.headers = collect_headers(&response);

        let content_type = fetch::header_value(&response, "content-type").unwrap_or_default();
        let body = fetch::read_capped(response, self.max_snippet, cancel).await;
        result.snippet = sanitize_snippet(&body, &content_type);
        result
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let request = self.client.request(method, url).header("Accept", "*/*");
        fetch::send(request, self.timeout, cancel).await
    }
}

fn collect_headers(response: &Response) -> BTreeMap<String, Vec<String>> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in response.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

/// Make a captured body safe to store and print.
///
/// Binary bodies with a non-text content type collapse to
/// [`NON_TEXT_MARKER`]. Otherwise each run of invalid UTF-8 becomes `?` and
/// control characters other than tab, CR and LF become `.`.
pub fn sanitize_snippet(body: &[u8], content_type: &str) -> String {
    if body.is_empty() {
        return String::new();
    }

    let ct = content_type.to_ascii_lowercase();
    let texty = ct.starts_with("text/")
        || ct.contains("json")
        || ct.contains("xml")
        || ct.contains("html");
    if !texty && std::str::from_utf8(body).is_err() {
        return NON_TEXT_MARKER.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut in_invalid_run = false;
    for chunk in body.utf8_chunks() {
        let valid = chunk.valid();
        if !valid.is_empty() {
            in_invalid_run = false;
        }
        for c in valid.chars() {
            out.push(match c {
                '\t' | '\r' | '\n' => c,
                c if (c as u32) < 32 || c as u32 == 127 => '.',
                c => c,
            });
        }
        if !chunk.invalid().is_empty() && !in_invalid_run {
            out.push('?');
            in_invalid_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn prober() -> Prober {
        let client = fetch::build_client("wdf-test", Duration::from_secs(5)).unwrap();
        Prober::new(client, Duration::from_secs(5))
    }

    #[test]
    fn test_sanitize_snippet() {
        assert_eq!(sanitize_snippet(b"", "text/plain"), "");
        assert_eq!(
            sanitize_snippet(b"a\tb\r\nc\x00d\x1be\x7f", "text/plain"),
            "a\tb\r\nc.d.e."
        );
        assert_eq!(
            sanitize_snippet(b"\x89PNG\r\n\x1a\n\xff\xfe", "image/png"),
            NON_TEXT_MARKER
        );
        assert_eq!(sanitize_snippet(b"ok\xff\xfe\xfdok", "text/html"), "ok?ok");
        assert_eq!(
            sanitize_snippet("caf\u{e9}".as_bytes(), "application/octet-stream"),
            "caf\u{e9}"
        );
        assert_eq!(
            sanitize_snippet(b"{\"k\":\"\xc3\"}", "application/json; charset=utf-8"),
            "{\"k\":\"?\"}"
        );
    }

    #[tokio::test]
    async fn test_head_200_follows_up_with_get() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/.env"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/.env"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Custom", "one")
                    .set_body_raw("DB_PASSWORD=hunter2\n", "text/plain"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/.env", mock_server.uri());
        let r = prober().probe(&url, &CancellationToken::new()).await;

        assert_eq!(r.method, "GET");
        assert_eq!(r.status_code, 200);
        assert_eq!(r.snippet, "DB_PASSWORD=hunter2\n");
        assert_eq!(r.header_values("x-custom"), vec!["one"]);
        assert!(r.error.is_none());
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_head_405_falls_back_to_get() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/admin"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/admin", mock_server.uri());
        let r = prober().probe(&url, &CancellationToken::new()).await;

        assert_eq!(r.method, "GET");
        assert_eq!(r.status_code, 403);
        assert_eq!(r.snippet, "forbidden");
    }

    #[tokio::test]
    async fn test_head_other_status_is_kept_without_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing", mock_server.uri());
        let r = prober().probe(&url, &CancellationToken::new()).await;

        assert_eq!(r.method, "HEAD");
        assert_eq!(r.status_code, 404);
        assert!(r.snippet.is_empty());
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_snippet_is_capped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("a".repeat(5000), "text/plain"),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/big", mock_server.uri());
        let r = prober()
            .with_max_snippet(16)
            .probe(&url, &CancellationToken::new())
            .await;
        assert_eq!(r.snippet, "a".repeat(16));
    }

    #[tokio::test]
    async fn test_redirect_chain_returns_last_response() {
        let mock_server = MockServer::start().await;
        for i in 0..15 {
            Mock::given(path(format!("/hop/{i}")))
                .respond_with(
                    ResponseTemplate::new(302).insert_header("location", format!("/hop/{}", i + 1)),
                )
                .mount(&mock_server)
                .await;
        }

        let url = format!("{}/hop/0", mock_server.uri());
        let r = prober().probe(&url, &CancellationToken::new()).await;

        assert!(r.error.is_none());
        assert_eq!(r.status_code, 302);
        assert_eq!(r.method, "HEAD");
    }

    #[tokio::test]
    async fn test_transport_failure_is_recorded() {
        let r = prober()
            .probe("http://127.0.0.1:1/nothing", &CancellationToken::new())
            .await;
        assert_eq!(r.method, "GET");
        assert_eq!(r.status_code, 0);
        assert!(r.error.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_probe_reports_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let r = prober().probe("http://127.0.0.1:1/x", &cancel).await;
        assert_eq!(r.error.as_deref(), Some("scan cancelled"));
    }
}
