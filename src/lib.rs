//! Latency and memory benchmarks for compiled inference artifacts.
//!
//! The [`harness::Harness`] finds artifacts in a directory, feeds each one
//! synthetic inputs that match its declared tensor contract, times the
//! invocations and measures heap growth over the timed window. Backends plug
//! in through [`backend::Backend`].

pub mod artifact_gen;
pub mod backend;
pub mod error;
pub mod harness;
pub mod locator;
pub mod profiler;
pub mod report;
pub mod runner;
pub mod schema;
pub mod stats;
pub mod synth;
pub mod tensor;

pub use error::{BenchError, Result};
pub use harness::{BenchConfig, Harness, Profile, RunReport};
pub use profiler::TrackingAllocator;

#[cfg(test)]
#[global_allocator]
static GLOBAL: profiler::TrackingAllocator = profiler::TrackingAllocator;
