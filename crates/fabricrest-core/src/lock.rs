//! Per-key advisory locks for read-modify-write cycles against the controller.
//!
//! The registry hands out one async mutex per key (policy id), created
//! lazily on first use and kept for the process lifetime. Keys are never
//! evicted; for a long-lived client the unbounded map is an accepted
//! tradeoff. The lock serializes callers within this process only — a
//! second client instance mutating the same remote object is last-write-wins
//! at the server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A lazily populated map of advisory mutexes keyed by arbitrary string.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Guard returned by [`LockRegistry::acquire`]. The lock is released when
/// the guard drops, on every exit path including error unwind.
pub type LockGuard = OwnedMutexGuard<()>;

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another caller holds it.
    pub async fn acquire(&self, key: &str) -> LockGuard {
        let entry = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        tracing::debug!(key, "acquiring advisory lock");
        entry.lock_owned().await
    }

    /// Number of keys the registry has seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let registry = Arc::new(LockRegistry::new());
        let in_section = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            let in_section = Arc::clone(&in_section);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire("policy-1").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst);
                assert_eq!(now, 0, "two holders inside the critical section");
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let registry = LockRegistry::new();
        let _a = registry.acquire("a").await;
        // Must not deadlock: different key, different mutex.
        let _b = registry.acquire("b").await;
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn released_on_drop() {
        let registry = LockRegistry::new();
        {
            let _guard = registry.acquire("k").await;
        }
        let _again = registry.acquire("k").await;
    }
}
