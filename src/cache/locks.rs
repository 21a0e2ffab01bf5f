//! Per-key locks for collapsing concurrent cache misses

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::CacheKey;

/// In-process lock table keyed by cache key
///
/// Holding the guard for a key while fetching and storing it makes other
/// callers for the same key wait, then find the fresh entry instead of
/// fetching again. Keys that nobody holds are pruned on each acquisition.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`
    pub async fn acquire(&self, key: &CacheKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let key = CacheKey::derive("http://x/a", "");

        let guard = locks.acquire(&key).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "Second acquire should wait");

        drop(guard);
        waiter.await.expect("Waiter should finish");
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire(&CacheKey::derive("http://x/a", "")).await;

        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(&CacheKey::derive("http://x/b", "")),
        )
        .await;

        assert!(b.is_ok(), "Other keys should be available immediately");
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyLocks::new();
        let guard = locks.acquire(&CacheKey::derive("http://x/a", "")).await;
        drop(guard);

        let _b = locks.acquire(&CacheKey::derive("http://x/b", "")).await;

        assert_eq!(locks.len(), 1);
    }
}
