use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

tokio::task_local! {
    static HELD_KEYS: RefCell<HashSet<String>>;
}

/// A per-key async mutex that is re-entrant within a single call chain: a
/// task that already holds `key` (directly, or via an outer `with_lock`
/// call further up the stack) runs the nested closure without blocking on
/// itself. Used to serialize operations on the same account, reservation,
/// or pot without deadlocking code paths that recurse through the engine
/// (e.g. `settlePot` locking several accounts while each credit also takes
/// its own account lock).
#[derive(Default)]
pub struct KeyedMutex {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` with `key` locked. If the current task already holds `key`,
    /// `f` runs immediately without taking the lock again.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let already_held = HELD_KEYS
            .try_with(|held| held.borrow().contains(key))
            .unwrap_or(false);

        if already_held {
            return f().await;
        }

        let lock = self.lock_for(key);
        let mut next = HELD_KEYS
            .try_with(|held| held.borrow().clone())
            .unwrap_or_default();
        next.insert(key.to_string());

        HELD_KEYS
            .scope(RefCell::new(next), async move {
                let _guard = lock.lock().await;
                f().await
            })
            .await
    }

    /// Lock several keys in a fixed, caller-chosen order, re-entrantly.
    /// Callers (e.g. pot settlement crediting several winner accounts) must
    /// sort keys themselves before calling this to guarantee a consistent
    /// global lock order across concurrent callers.
    pub fn with_lock_ordered<'a, F, Fut, T>(
        &'a self,
        keys: &'a [String],
        f: F,
    ) -> std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = T> + Send + 'a,
        T: Send + 'a,
    {
        Box::pin(async move {
            match keys.split_first() {
                None => f().await,
                Some((first, rest)) => self.with_lock(first, move || self.with_lock_ordered(rest, f)).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reentrant_lock_does_not_deadlock() {
        let mutex = KeyedMutex::new();
        let result = mutex
            .with_lock("acc-1", || async {
                mutex.with_lock("acc-1", || async { 42 }).await
            })
            .await;
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn ordered_lock_acquires_all_keys() {
        let mutex = KeyedMutex::new();
        let keys = vec!["acc-1".to_string(), "acc-2".to_string()];
        let result = mutex.with_lock_ordered(&keys, || async { "done" }).await;
        assert_eq!(result, "done");
    }
}
