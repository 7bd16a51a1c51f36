//! Room rate lookups behind a stampede-protected shared cache.
//!
//! The coordination protocol lives in `ratecache_core`; this crate supplies
//! the store backends, the rate API producer, instrumentation sinks and the
//! `ratecache` command line.

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod instrumentation;
pub mod output;
pub mod pricing;
