//! Bounded result store shared by all retry workers.
//!
//! Every mutation runs under one coarse [`parking_lot::Mutex`]. Store
//! operations are at most O(capacity), far cheaper than the optimizer call
//! whose result they record, so a single lock is enough.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use rp_types::{Bounds, OptimizerError, RetryConfig, RpResult};

use crate::snapshot::StoreSnapshot;
use crate::stats::{ImprovementTrace, RunningStats};

/// Number of stored fitness values shown in a status line.
const STATUS_VALUES: usize = 20;

/// Mutable part of the store, only touched with the lock held.
#[derive(Debug)]
struct StoreState {
    /// `capacity * dim` solution coordinates, entry `i` at `[i * dim, (i + 1) * dim)`.
    xs: Vec<f64>,
    ys: Vec<f64>,
    num_stored: usize,
    best_x: Vec<f64>,
    best_y: f64,
    count_evals: u64,
    count_runs: usize,
    count_accepted: usize,
    stats: RunningStats,
    trace: Option<ImprovementTrace>,
}

impl StoreState {
    fn x(&self, dim: usize, i: usize) -> &[f64] {
        &self.xs[i * dim..(i + 1) * dim]
    }

    fn write(&mut self, dim: usize, i: usize, y: f64, x: &[f64]) {
        self.ys[i] = y;
        self.xs[i * dim..(i + 1) * dim].copy_from_slice(x);
    }

    fn record_improvement(&mut self, elapsed: f64, y: f64) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(elapsed, y);
        }
    }
}

/// Status of the store at one point in time; formats as the status line.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatus {
    pub elapsed: f64,
    pub evals_per_sec: u64,
    pub runs: usize,
    pub evals: u64,
    pub best_y: f64,
    pub mean: f64,
    pub standard_deviation: f64,
    /// The first stored fitness values, in store order.
    pub ys: Vec<f64>,
    pub best_x: Vec<f64>,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} {} {} {} {:.6} {:.2} {:.2} [",
            self.elapsed,
            self.evals_per_sec,
            self.runs,
            self.evals,
            self.best_y,
            self.mean,
            self.standard_deviation
        )?;
        for (i, y) in self.ys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{y:.2}")?;
        }
        write!(f, "] [")?;
        for (i, x) in self.best_x.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{x}")?;
        }
        write!(f, "]")
    }
}

/// Thread safe store for optimization retry results.
#[derive(Debug)]
pub struct Store {
    run_id: Uuid,
    bounds: Bounds,
    capacity: usize,
    check_interval: usize,
    log_progress: bool,
    statistics: bool,
    started: Instant,
    /// Mirror of the best fitness for lock-free, possibly stale reads.
    best_y_bits: AtomicU64,
    state: Mutex<StoreState>,
}

impl Store {
    pub fn new(bounds: Bounds, config: &RetryConfig) -> RpResult<Self> {
        config.validate()?;
        let dim = bounds.dim();
        let capacity = config.capacity;
        let trace = config
            .statistics_enabled()
            .then(|| ImprovementTrace::new(config.statistic_num));

        Ok(Self {
            run_id: Uuid::new_v4(),
            bounds,
            capacity,
            check_interval: config.check_interval,
            log_progress: config.log_progress,
            statistics: config.statistics_enabled(),
            started: Instant::now(),
            best_y_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            state: Mutex::new(StoreState {
                xs: vec![0.0; capacity * dim],
                ys: vec![f64::INFINITY; capacity],
                num_stored: 0,
                best_x: Vec::new(),
                best_y: f64::INFINITY,
                count_evals: 0,
                count_runs: 0,
                count_accepted: 0,
                stats: RunningStats::new(),
                trace,
            }),
        })
    }

    /// Register the result of one optimizer retry.
    ///
    /// `evals` is always counted. The result itself is only kept when
    /// `y < limit`; a new best updates the best solution, its fitness and the
    /// improvement trace in one critical section.
    pub fn add_result(&self, y: f64, x: &[f64], evals: usize, limit: f64) -> RpResult<()> {
        let dim = self.dim();
        if x.len() != dim {
            return Err(OptimizerError::DimensionMismatch {
                expected: dim,
                actual: x.len(),
            }
            .into());
        }

        let mut state = self.state.lock();
        state.count_evals += evals as u64;
        let accepted = y < limit;
        if !accepted {
            return Ok(());
        }

        state.count_accepted += 1;
        if state.count_accepted % self.check_interval == 0 {
            self.evict_locked(&mut state);
        }

        if y < state.best_y {
            state.best_y = y;
            state.best_x.clear();
            state.best_x.extend_from_slice(x);
            self.best_y_bits.store(y.to_bits(), Ordering::Release);
            let elapsed = self.elapsed_secs();
            state.record_improvement(elapsed, y);
            self.log_status(&state);
        }

        state.stats.push(y);

        let slot = state.num_stored;
        state.write(dim, slot, y, x);
        state.num_stored = slot + 1;
        // A full store is compacted together with the incoming entry, so a new
        // best is never the one dropped.
        if slot + 1 >= self.capacity {
            self.evict_locked(&mut state);
        }
        Ok(())
    }

    /// Keep only the best 90% of the capacity, sorted by fitness.
    pub fn evict(&self) -> usize {
        let mut state = self.state.lock();
        self.evict_locked(&mut state)
    }

    fn evict_locked(&self, state: &mut StoreState) -> usize {
        let dim = self.dim();
        let num_stored = state.num_stored;
        let mut order: Vec<usize> = (0..num_stored).collect();
        // stable: equal fitness values keep insertion order
        order.sort_by(|&a, &b| state.ys[a].total_cmp(&state.ys[b]));

        let keep = num_stored.min(self.retained_capacity());
        let sorted: Vec<(f64, Vec<f64>)> = order[..keep]
            .iter()
            .map(|&i| (state.ys[i], state.x(dim, i).to_vec()))
            .collect();
        for (i, (y, x)) in sorted.iter().enumerate() {
            state.write(dim, i, *y, x);
        }
        state.num_stored = keep;

        if keep < num_stored {
            debug!(dropped = num_stored - keep, retained = keep, "evicted store entries");
        }
        keep
    }

    /// `floor(0.9 * capacity)`.
    pub fn retained_capacity(&self) -> usize {
        self.capacity * 9 / 10
    }

    /// Atomically claim one of `budget` retry slots.
    pub fn request_run_slot(&self, budget: usize) -> bool {
        let mut state = self.state.lock();
        if state.count_runs < budget {
            state.count_runs += 1;
            true
        } else {
            false
        }
    }

    /// Best fitness without taking the lock. May be slightly stale.
    pub fn peek_best_y(&self) -> f64 {
        f64::from_bits(self.best_y_bits.load(Ordering::Acquire))
    }

    /// Best-so-far fitness at `bucket_count` evenly spaced times.
    pub fn resample_improvements(&self, bucket_count: usize) -> RpResult<Vec<f64>> {
        let state = self.state.lock();
        match &state.trace {
            Some(trace) => trace.resample(bucket_count),
            None => Err(rp_types::RpError::Statistics(
                "statistics are disabled for this store".to_string(),
            )),
        }
    }

    /// Recorded (elapsed seconds, fitness) improvements.
    pub fn improvements(&self) -> Vec<(f64, f64)> {
        let state = self.state.lock();
        state
            .trace
            .as_ref()
            .map(|trace| trace.entries().to_vec())
            .unwrap_or_default()
    }

    pub fn status(&self) -> StoreStatus {
        let state = self.state.lock();
        self.status_locked(&state)
    }

    fn status_locked(&self, state: &StoreState) -> StoreStatus {
        let elapsed = self.elapsed_secs();
        let evals_per_sec = if elapsed > 0.0 {
            (state.count_evals as f64 / elapsed) as u64
        } else {
            0
        };
        StoreStatus {
            elapsed,
            evals_per_sec,
            runs: state.count_runs,
            evals: state.count_evals,
            best_y: state.best_y,
            mean: state.stats.mean(),
            standard_deviation: state.stats.standard_deviation(),
            ys: state.ys[..state.num_stored.min(STATUS_VALUES)].to_vec(),
            best_x: state.best_x.clone(),
        }
    }

    /// Log the current status line.
    pub fn dump(&self) {
        if !self.log_progress {
            return;
        }
        let state = self.state.lock();
        self.log_status(&state);
    }

    fn log_status(&self, state: &StoreState) {
        if self.log_progress {
            info!("{}", self.status_locked(state));
        }
    }

    /// Consistent copy of all stored entries.
    pub fn snapshot(&self, run: &str) -> StoreSnapshot {
        let state = self.state.lock();
        let dim = self.dim();
        StoreSnapshot {
            run: run.to_string(),
            run_id: self.run_id,
            taken_at: chrono::Utc::now(),
            count_evals: state.count_evals,
            count_runs: state.count_runs,
            best_x: state.best_x.clone(),
            best_y: state.best_y.is_finite().then_some(state.best_y),
            xs: (0..state.num_stored)
                .map(|i| state.x(dim, i).to_vec())
                .collect(),
            ys: state.ys[..state.num_stored].to_vec(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn dim(&self) -> usize {
        self.bounds.dim()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn statistics_enabled(&self) -> bool {
        self.statistics
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn best_x(&self) -> Vec<f64> {
        self.state.lock().best_x.clone()
    }

    pub fn best_y(&self) -> f64 {
        self.state.lock().best_y
    }

    /// Best fitness and solution read together.
    pub fn best(&self) -> (f64, Vec<f64>) {
        let state = self.state.lock();
        (state.best_y, state.best_x.clone())
    }

    pub fn count_evals(&self) -> u64 {
        self.state.lock().count_evals
    }

    pub fn count_runs(&self) -> usize {
        self.state.lock().count_runs
    }

    pub fn count_accepted(&self) -> usize {
        self.state.lock().count_accepted
    }

    pub fn num_stored(&self) -> usize {
        self.state.lock().num_stored
    }

    pub fn xs(&self) -> Vec<Vec<f64>> {
        let state = self.state.lock();
        let dim = self.dim();
        (0..state.num_stored)
            .map(|i| state.x(dim, i).to_vec())
            .collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        let state = self.state.lock();
        state.ys[..state.num_stored].to_vec()
    }

    pub fn mean(&self) -> f64 {
        self.state.lock().stats.mean()
    }

    pub fn standard_deviation(&self) -> f64 {
        self.state.lock().stats.standard_deviation()
    }
}
