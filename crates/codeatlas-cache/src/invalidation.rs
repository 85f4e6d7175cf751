use codeatlas_core::CacheStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Aggregate caches with one well-known key per repository.
const EXACT_CACHES: &[&str] = &["stats", "health", "features", "graph-meta"];

/// Dynamically-keyed cache families, evicted by prefix.
const PREFIX_CACHES: &[&str] = &["toposort", "rejustify", "search", "prefetch", "rules"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub exact_evicted: usize,
    pub prefixes_evicted: usize,
    pub failures: usize,
}

/// Evicts derived read caches for one org+repo after an indexing run.
///
/// Every eviction is attempted independently: a stale cache is a
/// degradation, not a hard failure, so a backend error on one key is logged
/// and the remaining keys are still tried.
pub struct CacheInvalidator {
    cache: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    pub async fn invalidate(&self, organization_id: &str, repository_id: &str) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for name in EXACT_CACHES {
            let key = format!("{}:{}:{}", name, organization_id, repository_id);
            match self.cache.invalidate(&key).await {
                Ok(()) => report.exact_evicted += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(key = %key, error = %e, "cache eviction failed, continuing");
                }
            }
        }

        if self.cache.supports_prefix_invalidation() {
            for name in PREFIX_CACHES {
                let prefix = format!("{}:{}:{}:", name, organization_id, repository_id);
                match self.cache.invalidate_by_prefix(&prefix).await {
                    Ok(_) => report.prefixes_evicted += 1,
                    Err(e) => {
                        report.failures += 1;
                        warn!(prefix = %prefix, error = %e, "prefix eviction failed, continuing");
                    }
                }
            }
        } else {
            debug!("cache backend lacks prefix invalidation, skipping dynamic families");
        }

        debug!(
            exact = report.exact_evicted,
            prefixes = report.prefixes_evicted,
            failures = report.failures,
            "cache invalidation complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codeatlas_core::{CodeAtlasError, Result};
    use dashmap::DashMap;
    use parking_lot::RwLock;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FlakyCache {
        entries: DashMap<String, String>,
        fail_on: RwLock<HashSet<String>>,
        prefix_capable: bool,
    }

    #[async_trait]
    impl CacheStore for FlakyCache {
        async fn invalidate(&self, key: &str) -> Result<()> {
            if self.fail_on.read().contains(key) {
                return Err(CodeAtlasError::Cache(format!("backend down for {}", key)));
            }
            self.entries.remove(key);
            Ok(())
        }

        fn supports_prefix_invalidation(&self) -> bool {
            self.prefix_capable
        }

        async fn invalidate_by_prefix(&self, prefix: &str) -> Result<usize> {
            let keys: Vec<String> = self
                .entries
                .iter()
                .filter(|e| e.key().starts_with(prefix))
                .map(|e| e.key().clone())
                .collect();
            for key in &keys {
                self.entries.remove(key);
            }
            Ok(keys.len())
        }
    }

    #[tokio::test]
    async fn one_failing_key_does_not_abort_siblings() {
        let cache = Arc::new(FlakyCache {
            prefix_capable: true,
            ..Default::default()
        });
        cache.entries.insert("stats:org:repo".into(), "v".into());
        cache.entries.insert("health:org:repo".into(), "v".into());
        cache
            .entries
            .insert("search:org:repo:query-1".into(), "v".into());
        cache.fail_on.write().insert("stats:org:repo".into());

        let report = CacheInvalidator::new(cache.clone())
            .invalidate("org", "repo")
            .await;
        assert_eq!(report.failures, 1);
        assert_eq!(report.exact_evicted, EXACT_CACHES.len() - 1);
        assert_eq!(report.prefixes_evicted, PREFIX_CACHES.len());
        // The failing key stays; its siblings were still evicted.
        assert!(cache.entries.contains_key("stats:org:repo"));
        assert!(!cache.entries.contains_key("health:org:repo"));
        assert!(!cache.entries.contains_key("search:org:repo:query-1"));
    }

    #[tokio::test]
    async fn degrades_without_prefix_capability() {
        let cache = Arc::new(FlakyCache::default());
        cache
            .entries
            .insert("search:org:repo:query-1".into(), "v".into());
        let report = CacheInvalidator::new(cache.clone())
            .invalidate("org", "repo")
            .await;
        assert_eq!(report.prefixes_evicted, 0);
        assert_eq!(report.failures, 0);
        // Dynamic families survive, exact keys were still handled.
        assert!(cache.entries.contains_key("search:org:repo:query-1"));
    }
}
