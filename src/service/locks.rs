use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Registry = HashMap<String, Arc<Mutex<()>>>;

/// Registry of per-content critical sections.
///
/// Each content id maps to its own async mutex; contended operations on
/// different content ids never wait on each other. An entry lives only while
/// some task holds or awaits it, then [`ContentGuard`] removes it.
#[derive(Default)]
pub struct ContentLocks {
    locks: StdMutex<Registry>,
}

/// Exclusive access to one content id. Dropping it releases the mutex and
/// prunes the registry entry once nobody else references it.
pub struct ContentGuard<'a> {
    registry: &'a ContentLocks,
    content_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ContentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `content_id`.
    pub async fn lock(&self, content_id: &str) -> ContentGuard<'_> {
        let entry = self
            .registry()
            .entry(content_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Declared before `acquire` so that, if this future is cancelled,
        // `acquire` (and its Arc clone) drops first and the guard can prune.
        let mut guard = ContentGuard {
            registry: self,
            content_id: content_id.to_string(),
            guard: None,
        };
        let acquire = entry.lock_owned();
        guard.guard = Some(acquire.await);
        guard
    }

    /// Number of content ids currently held or awaited.
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ContentGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex (and its Arc clone) before inspecting the count.
        self.guard.take();

        let mut locks = self.registry.registry();
        let unused = locks
            .get(&self.content_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1);
        if unused {
            locks.remove(&self.content_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_content_serializes() {
        let locks = Arc::new(ContentLocks::new());
        let guard = locks.lock("default").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("default").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_content_does_not_block() {
        let locks = ContentLocks::new();
        let _a = locks.lock("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_pruned_after_release() {
        let locks = ContentLocks::new();
        for i in 0..100 {
            let _guard = locks.lock(&format!("doc-{i}")).await;
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_pending() {
        let locks = Arc::new(ContentLocks::new());
        let first = locks.lock("doc").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("doc").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_wait_prunes_entry() {
        let locks = ContentLocks::new();
        let held = locks.lock("doc").await;

        let timed_out = tokio::time::timeout(Duration::from_millis(20), locks.lock("doc")).await;
        assert!(timed_out.is_err());

        drop(held);
        assert!(locks.is_empty());
    }
}
