use async_trait::async_trait;
use std::time::Duration;

/// Key-value cache with per-entry expiry.
///
/// Expired entries are not served by [`Cache::get`] but stay readable through
/// [`Cache::get_stale`] until they are replaced, so callers can fall back to the
/// last good value when a refresh fails.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Option<V>;

    async fn get_stale(&self, key: &K) -> Option<V>;

    async fn put(&self, key: K, value: V, ttl: Option<Duration>);

    async fn remove(&self, key: &K);

    async fn clear(&self);
}
