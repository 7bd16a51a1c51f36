//! Redis cache backend implementation.
//!
//! Shares the store and notification channels between processes, which is
//! what makes the lock protocol effective across a fleet.

mod cache;
mod error;
mod pubsub;

pub use cache::RedisCache;
pub use pubsub::RedisPubSub;
