/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Time-bounded single-slot snapshot cache

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct Snapshot<T> {
    produced_at: Instant,
    value: Arc<T>,
}

/// Holds the last successful snapshot and the instant it was produced
///
/// The timestamp and value are swapped together under one lock, so readers
/// never observe a new timestamp paired with old data. The lock is never held
/// across collection: two concurrent misses may both collect, and the later
/// one wins.
pub struct SnapshotCache<T> {
    window: Duration,
    slot: RwLock<Option<Snapshot<T>>>,
}

impl<T> SnapshotCache<T> {
    /// Create an empty cache whose entries stay fresh for `window`
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: RwLock::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The stored snapshot if it is younger than the window
    pub fn fresh(&self) -> Option<Arc<T>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        let hit = slot
            .as_ref()
            .filter(|snapshot| snapshot.produced_at.elapsed() < self.window)
            .map(|snapshot| Arc::clone(&snapshot.value));
        hit
    }

    /// Replace the stored snapshot
    pub fn store(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Snapshot {
            produced_at: Instant::now(),
            value: Arc::clone(&value),
        });
        value
    }

    /// Return the fresh snapshot, or run `collect` and store its result
    ///
    /// A failed collection leaves the slot untouched.
    pub async fn get_or_refresh<F, Fut, E>(&self, collect: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.fresh() {
            log::debug!("snapshot cache hit");
            return Ok(hit);
        }

        log::debug!("snapshot cache miss, collecting");
        let value = collect().await?;
        Ok(self.store(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_hit_within_window_skips_collection() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let value = cache
                .get_or_refresh(move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recollected() {
        let cache = SnapshotCache::new(Duration::from_millis(20));
        cache.store(1u32);
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.fresh().is_none());
        let value = cache
            .get_or_refresh(|| async { Ok::<_, String>(2u32) })
            .await
            .unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_failed_collection_keeps_previous_snapshot() {
        let cache = SnapshotCache::new(Duration::ZERO);
        cache.store("old".to_string());

        let result = cache
            .get_or_refresh(|| async { Err::<String, _>("netstat missing") })
            .await;
        assert_eq!(result.unwrap_err(), "netstat missing");

        let slot = cache.slot.read().unwrap();
        assert_eq!(slot.as_ref().unwrap().value.as_str(), "old");
    }

    #[test]
    fn test_empty_cache_is_not_fresh() {
        let cache: SnapshotCache<u8> = SnapshotCache::new(Duration::from_secs(5));
        assert!(cache.fresh().is_none());
        assert_eq!(cache.window(), Duration::from_secs(5));
    }
}
