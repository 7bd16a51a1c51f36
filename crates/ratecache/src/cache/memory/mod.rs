//! In-memory cache backend implementation.
//!
//! Provides a thread-safe in-memory store with TTL support and pub/sub
//! for single-process deployments and tests.

mod cache;
mod pubsub;

pub use cache::MemoryCache;
pub use pubsub::MemoryPubSub;
