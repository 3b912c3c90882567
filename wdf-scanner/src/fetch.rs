//! Shared HTTP plumbing: client construction, cancellable sends and
//! size-capped body reads.

use crate::error::{Result, ScanError};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const MAX_REDIRECTS: usize = 10;

/// Build the client shared by discovery and probing. Redirects are followed
/// up to [`MAX_REDIRECTS`] hops; past that the last response is returned
/// as-is instead of failing.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .redirect(Policy::custom(|attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }))
        .build()?;
    Ok(client)
}

/// Send a request with its own timeout, giving up early if the scan is
/// cancelled.
pub async fn send(
    request: RequestBuilder,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Response> {
    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(ScanError::Cancelled),
        response = request.timeout(timeout).send() => Ok(response?),
    }
}

/// Read at most `max_bytes` of the response body. Whatever was read before a
/// mid-body failure is kept.
pub async fn read_capped(
    mut response: Response,
    max_bytes: usize,
    cancel: &CancellationToken,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(max_bytes.min(64 * 1024));
    while body.len() < max_bytes {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = response.chunk() => chunk,
        };
        match chunk {
            Ok(Some(bytes)) => {
                let remaining = max_bytes - body.len();
                body.extend_from_slice(&bytes[..bytes.len().min(remaining)]);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("body read stopped early: {}", e);
                break;
            }
        }
    }
    body
}

/// First value of a header, lossily decoded.
pub fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}
