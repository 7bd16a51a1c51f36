//! Room rate pricing on top of the cache coordinator.
//!
//! [`RateApiClient`] talks to the upstream rate API, [`RateProducer`] adapts
//! it to the coordinator, and [`PricingService`] is what callers use.

mod client;
mod error;
mod producer;
mod request;
mod service;

pub use client::{select_rate, RateApiClient, RateRecord, RatesResponse};
pub use error::{ClientError, Result};
pub use producer::RateProducer;
pub use request::RateRequest;
pub use service::{PricingService, UNAVAILABLE_MESSAGE};
