//! Per-key generation locks
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<Mutex<()>>>;

/// Hands out one async lock per key. Entries are dropped again once no
/// guard or waiter holds them.
#[derive(Default, Clone)]
pub struct KeyLocks {
    inflight: Arc<StdMutex<LockMap>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on `key`. It is held until the guard drops.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        KeyGuard {
            key: key.to_string(),
            guard: Some(guard),
            lock,
            inflight: Arc::clone(&self.inflight),
        }
    }

    /// Keys with a holder or waiter.
    pub fn len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds one key's lock. Can be moved onto another thread or task.
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    inflight: Arc<StdMutex<LockMap>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        // the map and this guard are the only holders left
        if Arc::strong_count(&self.lock) == 2 {
            inflight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_are_pruned() {
        let locks = KeyLocks::new();
        {
            let _guard = locks.acquire("a").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyLocks::new();
        let guard = locks.acquire("a").await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire("a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.acquire("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }
}
