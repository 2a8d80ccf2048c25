//! Run configuration for the parallel retry orchestrator.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;

use crate::errors::RpResult;

/// Every option recognized by the orchestrator, with its default.
///
/// Passed explicitly to `minimize`/`retry`; there is no global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of optimizer retries granted across all workers.
    pub num_retries: usize,

    /// Number of parallel workers.
    pub workers: usize,

    /// Maximum number of entries retained by the store.
    pub capacity: usize,

    /// The store is compacted every `check_interval` accepted results.
    pub check_interval: usize,

    /// Only results with a fitness strictly below this limit are stored.
    /// Written as `null` when unbounded.
    #[serde(with = "unbounded_above")]
    pub value_limit: f64,

    /// Workers stop starting new retries once the best fitness reaches this value.
    /// Written as `null` when unbounded.
    #[serde(with = "unbounded_below")]
    pub stop_fitness: f64,

    /// Size of the improvement trace; 0 disables statistics.
    pub statistic_num: usize,

    /// Emit status lines for new best values and dumps.
    pub log_progress: bool,

    /// When set, a snapshot of the store is written after every retry.
    pub snapshot_name: Option<String>,

    /// Directory for persisted artifacts.
    pub output_dir: PathBuf,

    /// Master seed for the worker random streams; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

// JSON has no infinities, so an unbounded limit travels as `null`.
fn serialize_unbounded<S: Serializer>(value: f64, unbounded: f64, s: S) -> Result<S::Ok, S::Error> {
    if value == unbounded {
        s.serialize_none()
    } else {
        s.serialize_some(&value)
    }
}

mod unbounded_above {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        serialize_unbounded(*value, f64::INFINITY, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

mod unbounded_below {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        serialize_unbounded(*value, f64::NEG_INFINITY, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            num_retries: 1024,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            capacity: 500,
            check_interval: 10,
            value_limit: f64::INFINITY,
            stop_fitness: f64::NEG_INFINITY,
            statistic_num: 0,
            log_progress: true,
            snapshot_name: None,
            output_dir: PathBuf::from("."),
            seed: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_retries(mut self, n: usize) -> Self {
        self.num_retries = n;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn with_capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    pub fn with_check_interval(mut self, n: usize) -> Self {
        self.check_interval = n;
        self
    }

    pub fn with_value_limit(mut self, limit: f64) -> Self {
        self.value_limit = limit;
        self
    }

    pub fn with_stop_fitness(mut self, stop_fitness: f64) -> Self {
        self.stop_fitness = stop_fitness;
        self
    }

    pub fn with_statistic_num(mut self, n: usize) -> Self {
        self.statistic_num = n;
        self
    }

    pub fn with_log_progress(mut self, enabled: bool) -> Self {
        self.log_progress = enabled;
        self
    }

    pub fn with_snapshot_name(mut self, name: impl Into<String>) -> Self {
        self.snapshot_name = Some(name.into());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn statistics_enabled(&self) -> bool {
        self.statistic_num > 0
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> RpResult<()> {
        if self.capacity == 0 {
            return Err(crate::config_error!("capacity must be positive"));
        }
        if self.workers == 0 {
            return Err(crate::config_error!("at least one worker is required"));
        }
        if self.check_interval == 0 {
            return Err(crate::config_error!("check_interval must be positive"));
        }
        if self.value_limit.is_nan() {
            return Err(crate::config_error!("value_limit must not be NaN"));
        }
        if self.stop_fitness.is_nan() {
            return Err(crate::config_error!("stop_fitness must not be NaN"));
        }
        Ok(())
    }
}
