pub mod idempotency_cache;
pub mod keyed_mutex;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_store;
pub mod store;

pub use idempotency_cache::IdempotencyCache;
pub use keyed_mutex::KeyedMutex;
pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use store::Store;
