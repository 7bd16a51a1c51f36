mod error;
mod keys;
mod patterns;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{heartbeat_key, lock_key, updates_channel, CacheKey, Heartbeat};
pub use patterns::pattern_matches;
pub use serialization::{deserialize_value, serialize_value, SerializationError};
pub use traits::{CacheStore, NotificationChannel};
