use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{IdempotencyKey, IdempotencyRecord, Timestamp};

use crate::store::Store;

/// Implements the cache-or-execute rule every idempotent command follows:
///
/// 1. No record for `key` → run the command, cache its response, return it.
/// 2. Record exists, fingerprint matches, not expired → decode and replay
///    the cached response without running the command again.
/// 3. Record exists, fingerprint differs → the key was reused for a
///    different request; this is a caller error, not a replay.
/// 4. Record exists but expired → treated as case 1.
pub struct IdempotencyCache<'a> {
    store: &'a dyn Store,
    ttl_ms: i64,
}

impl<'a> IdempotencyCache<'a> {
    pub fn new(store: &'a dyn Store, ttl_ms: i64) -> Self {
        Self { store, ttl_ms }
    }

    pub async fn execute<F, Fut, T>(
        &self,
        key: &IdempotencyKey,
        request_fingerprint: &str,
        now_ms: Timestamp,
        f: F,
    ) -> BalanceResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = BalanceResult<T>>,
    {
        if let Some(record) = self.store.get_idempotency(key).await? {
            if !record.is_expired_at(now_ms) {
                if record.request_fingerprint != request_fingerprint {
                    return Err(BalanceError::IdempotencyKeyConflict { key: key.to_string() });
                }
                let decoded: T = serde_json::from_str(&record.response_json)
                    .map_err(|e| BalanceError::Serialization(e.to_string()))?;
                return Ok(decoded);
            }
        }

        let response = f().await?;
        let response_json =
            serde_json::to_string(&response).map_err(|e| BalanceError::Serialization(e.to_string()))?;
        let record = IdempotencyRecord {
            key: key.clone(),
            request_fingerprint: request_fingerprint.to_string(),
            response_json,
            created_at: now_ms,
            expires_at: now_ms + self.ttl_ms,
        };
        self.store.put_idempotency(record).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Reply {
        value: u32,
    }

    #[tokio::test]
    async fn replays_cached_response_on_matching_retry() {
        let store = MemoryStore::new();
        let cache = IdempotencyCache::new(&store, 60_000);
        let key = IdempotencyKey::new("req-1");
        let calls = AtomicU32::new(0);

        let first = cache
            .execute(&key, "fingerprint-a", 1_000, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Reply { value: 7 })
            })
            .await
            .unwrap();
        assert_eq!(first, Reply { value: 7 });

        let second = cache
            .execute(&key, "fingerprint-a", 1_500, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Reply { value: 999 })
            })
            .await
            .unwrap();

        assert_eq!(second, Reply { value: 7 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejects_key_reuse_with_different_fingerprint() {
        let store = MemoryStore::new();
        let cache = IdempotencyCache::new(&store, 60_000);
        let key = IdempotencyKey::new("req-2");

        cache
            .execute(&key, "fingerprint-a", 1_000, || async { Ok(Reply { value: 1 }) })
            .await
            .unwrap();

        let err = cache
            .execute(&key, "fingerprint-b", 1_000, || async { Ok(Reply { value: 2 }) })
            .await
            .unwrap_err();
        assert!(matches!(err, BalanceError::IdempotencyKeyConflict { .. }));
    }
}
