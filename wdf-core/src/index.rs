use async_trait::async_trait;

/// Reports whether a path on a target is known to be indexed by a search
/// engine.
///
/// `target` is the origin (`scheme://host[:port]`), `path` the normalized
/// path that was probed. Errors never fail the scan; they surface as an
/// informational reason on the result.
#[async_trait]
pub trait IndexChecker: Send + Sync {
    async fn is_indexed(&self, target: &str, path: &str) -> anyhow::Result<bool>;
}

/// Placeholder checker that never reports anything as indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubIndexChecker;

#[async_trait]
impl IndexChecker for StubIndexChecker {
    async fn is_indexed(&self, _target: &str, _path: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}
