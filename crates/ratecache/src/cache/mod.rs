//! Cache backend implementations.
//!
//! Concrete implementations of the store and notification traits defined in
//! `ratecache_core::cache`.
//!
//! - `memory`: in-process store, always built. Only coordinates callers
//!   within one process.
//! - `redis_impl` (feature `redis`): shared Redis store, coordinates callers
//!   across processes.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use memory::{MemoryCache, MemoryPubSub};

#[cfg(feature = "redis")]
pub use redis_impl::{RedisCache, RedisPubSub};
