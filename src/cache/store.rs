//! In-memory response cache keyed by request path.

use std::path::Path;
use std::sync::RwLock;

use lru::LruCache;
use metrics::counter;
use tracing::{debug, info};

use super::{
    config::CacheConfig,
    entry::CachedResponse,
    error::CacheError,
    lock::{rw_read, rw_write},
    snapshot::{SerializedResponse, Snapshot},
};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "frugal_cache_hit_total";
const METRIC_MISS: &str = "frugal_cache_miss_total";
const METRIC_EVICT: &str = "frugal_cache_evict_total";

/// Path-keyed store of rendered responses with LRU eviction.
///
/// Safe to share across request tasks; every operation takes the lock once.
pub struct ResponseCache {
    responses: RwLock<LruCache<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            responses: RwLock::new(LruCache::new(config.response_limit_non_zero())),
        }
    }

    /// Look up the response for `path`, marking it recently used.
    pub fn get(&self, path: &str) -> Option<CachedResponse> {
        let found = rw_write(&self.responses, SOURCE, "get")
            .get(path)
            .cloned();
        if found.is_some() {
            counter!(METRIC_HIT).increment(1);
        } else {
            counter!(METRIC_MISS).increment(1);
        }
        found
    }

    pub fn has(&self, path: &str) -> bool {
        rw_read(&self.responses, SOURCE, "has").contains(path)
    }

    /// Store `response` under its path. When the entry it replaces has the same
    /// content hash, the earlier generation date is kept. Returns what is now cached.
    pub fn add(&self, response: CachedResponse) -> CachedResponse {
        let mut responses = rw_write(&self.responses, SOURCE, "add");

        let response = match responses.peek(response.path()) {
            Some(previous) if previous.hash() == response.hash() => {
                debug!(
                    path = response.path(),
                    hash = response.hash(),
                    "content unchanged, keeping generation date"
                );
                let generated_at = previous.generated_at();
                response.with_generated_at(generated_at)
            }
            _ => response,
        };

        let path = response.path().to_string();
        if let Some((evicted, _)) = responses.push(path.clone(), response.clone())
            && evicted != path
        {
            debug!(path = %evicted, "evicted least recently used response");
            counter!(METRIC_EVICT).increment(1);
        }
        response
    }

    pub fn remove(&self, path: &str) -> Option<CachedResponse> {
        rw_write(&self.responses, SOURCE, "remove").pop(path)
    }

    pub fn clear(&self) {
        rw_write(&self.responses, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializable view of every entry, least recently used first.
    pub fn snapshot(&self) -> Snapshot {
        let responses = rw_read(&self.responses, SOURCE, "snapshot");
        Snapshot::new(
            responses
                .iter()
                .rev()
                .map(|(_, response)| SerializedResponse::from(response))
                .collect(),
        )
    }

    /// Write every entry to `path`. Returns the number of entries written.
    pub async fn persist(&self, path: &Path) -> Result<usize, CacheError> {
        let snapshot = self.snapshot();
        let count = snapshot.entries.len();
        snapshot.write(path).await?;
        info!(path = %path.display(), entries = count, "persisted response cache");
        Ok(count)
    }

    /// Restore entries from `path`. A missing file loads nothing.
    pub async fn load(&self, path: &Path) -> Result<usize, CacheError> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|source| CacheError::io(path, source))?
        {
            debug!(path = %path.display(), "no cache snapshot to load");
            return Ok(0);
        }

        let entries = Snapshot::read(path)
            .await?
            .entries
            .into_iter()
            .map(CachedResponse::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let count = entries.len();

        let mut responses = rw_write(&self.responses, SOURCE, "load");
        for response in entries {
            responses.put(response.path().to_string(), response);
        }
        drop(responses);

        info!(path = %path.display(), entries = count, "loaded response cache");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use axum::http::{HeaderMap, StatusCode};
    use time::{Duration, OffsetDateTime};

    use super::*;

    fn response(path: &str, hash: &str, generated_at: OffsetDateTime) -> CachedResponse {
        CachedResponse::from_parts(
            path.to_string(),
            hash.to_string(),
            Some(format!("<p>{path}</p>")),
            HeaderMap::new(),
            StatusCode::OK,
            generated_at,
            -1,
        )
    }

    fn cache(limit: usize) -> ResponseCache {
        ResponseCache::new(&CacheConfig {
            response_limit: limit,
            ..Default::default()
        })
    }

    #[test]
    fn add_then_get_round_trips() {
        let cache = cache(8);
        assert!(cache.get("/x").is_none());
        assert!(!cache.has("/x"));

        let now = OffsetDateTime::now_utc();
        cache.add(response("/x", "h1", now));

        assert!(cache.has("/x"));
        let cached = cache.get("/x").expect("cached");
        assert_eq!(cached.hash(), "h1");
        assert_eq!(cached.body(), Some("<p>/x</p>"));
    }

    #[test]
    fn unchanged_hash_keeps_first_generation_date() {
        let cache = cache(8);
        let first = OffsetDateTime::now_utc() - Duration::minutes(5);
        let second = OffsetDateTime::now_utc();

        cache.add(response("/x", "same", first));
        let kept = cache.add(response("/x", "same", second));

        assert_eq!(kept.generated_at(), first);
        assert_eq!(cache.get("/x").expect("cached").generated_at(), first);
    }

    #[test]
    fn changed_hash_replaces_entry_and_date() {
        let cache = cache(8);
        let first = OffsetDateTime::now_utc() - Duration::minutes(5);
        let second = OffsetDateTime::now_utc();

        cache.add(response("/x", "old", first));
        cache.add(response("/x", "new", second));

        let cached = cache.get("/x").expect("cached");
        assert_eq!(cached.hash(), "new");
        assert_eq!(cached.generated_at(), second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = cache(2);
        let now = OffsetDateTime::now_utc();
        cache.add(response("/a", "a", now));
        cache.add(response("/b", "b", now));
        assert!(cache.get("/a").is_some());

        cache.add(response("/c", "c", now));
        assert!(cache.has("/a"));
        assert!(!cache.has("/b"));
        assert!(cache.has("/c"));
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let cache = cache(2);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.responses.write().expect("lock should be acquired");
            panic!("poison response cache lock");
        }));

        cache.add(response("/x", "h", OffsetDateTime::now_utc()));
        assert!(cache.has("/x"));
    }

    #[tokio::test]
    async fn persist_and_load_preserve_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let generated = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .expect("valid nanosecond");

        let source = cache(8);
        source.add(response("/a", "a", generated));
        source.add(response("/b", "b", generated));
        assert_eq!(source.persist(&path).await.expect("persists"), 2);

        let restored = cache(8);
        assert_eq!(restored.load(&path).await.expect("loads"), 2);
        let entry = restored.get("/b").expect("restored");
        assert_eq!(entry.hash(), "b");
        assert_eq!(entry.generated_at(), generated);
        assert_eq!(entry.max_age(), -1);
    }

    #[tokio::test]
    async fn loading_missing_snapshot_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache(8);
        assert_eq!(
            cache
                .load(&dir.path().join("absent.json"))
                .await
                .expect("no-op"),
            0
        );
        assert!(cache.is_empty());
    }
}
