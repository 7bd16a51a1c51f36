//! Core types for ratecache.
//!
//! This crate holds the backend-agnostic pieces: the cache store and
//! notification traits, the value producer trait, instrumentation events, and
//! the [`coordinator::Coordinator`] that ties them together. Concrete stores
//! and producers live in the `ratecache` crate.

pub mod cache;
pub mod coordinator;
pub mod instrumentation;
pub mod producer;
