//! # rp-retry
//!
//! Parallel optimization retry for Reprise.
//!
//! Many independent local optimizer runs ("retries") are spread over worker
//! threads. Their results are collected in a bounded, lock-protected
//! [`Store`] that tracks the best solution, running statistics and an
//! optional improvement trace, and that caps the total number of retries.

mod optimizer;
mod retry;
mod seed;
mod snapshot;
mod stats;
mod store;

pub use optimizer::{uniform_point, Objective, OnePlusOne, Optimizer, RandomSampling};
pub use retry::{minimize, minimize_with_trace, retry, RetryLoop, WorkerSummary};
pub use seed::SeedStream;
pub use snapshot::{
    filter_improvements, load_improvements, load_snapshot, save_improvements, save_snapshot,
    ImprovementFile, StoreSnapshot,
};
pub use stats::{ImprovementTrace, RunningStats};
pub use store::{Store, StoreStatus};

pub use rp_types::{Bounds, OptimizeResult, RetryConfig, RetryResult, RpError, RpResult};
