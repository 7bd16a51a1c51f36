use serde::{Deserialize, Serialize};

use ratecache_core::cache::CacheKey;

/// A room rate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateRequest {
    pub period: String,
    pub hotel: String,
    pub room: String,
}

impl RateRequest {
    pub fn new(
        period: impl Into<String>,
        hotel: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            period: period.into(),
            hotel: hotel.into(),
            room: room.into(),
        }
    }

    /// `rate:<hotel>:<room>:<period>`, tagged with each field.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new("rate")
            .with_dimension("hotel", self.hotel.as_str())
            .with_dimension("room", self.room.as_str())
            .with_dimension("period", self.period.as_str())
    }
}
