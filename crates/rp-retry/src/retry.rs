//! Parallel retry: per-worker loops and the orchestrator that runs them.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

use rp_types::{Bounds, OptimizeResult, OptimizerError, RetryConfig, RpError, RpResult};

use crate::optimizer::{Objective, Optimizer};
use crate::seed::SeedStream;
use crate::snapshot::{filter_improvements, save_improvements, save_snapshot};
use crate::store::Store;

/// Range of the initial step size drawn for every retry.
const STEP_RANGE: std::ops::Range<f64> = 0.05..0.1;

/// What one worker did during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub retries: usize,
    pub failed: usize,
}

/// Control loop of a single worker.
pub struct RetryLoop<'a> {
    worker_id: usize,
    store: &'a Store,
    objective: &'a dyn Objective,
    optimizer: &'a dyn Optimizer,
    config: &'a RetryConfig,
    rng: ChaCha8Rng,
}

impl<'a> RetryLoop<'a> {
    pub fn new(
        worker_id: usize,
        store: &'a Store,
        objective: &'a dyn Objective,
        optimizer: &'a dyn Optimizer,
        config: &'a RetryConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            worker_id,
            store,
            objective,
            optimizer,
            config,
            rng,
        }
    }

    /// Run retries until the budget is used up or the stop fitness is reached.
    ///
    /// The stop check reads the best value without the lock, so a worker may
    /// start one more retry right after another worker crossed the threshold.
    pub fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::default();
        while self.store.request_run_slot(self.config.num_retries)
            && self.store.peek_best_y() > self.config.stop_fitness
        {
            summary.retries += 1;
            if let Err(e) = self.retry_once() {
                summary.failed += 1;
                warn!(worker = self.worker_id, error = %e, "retry failed");
            }
        }
        summary
    }

    fn retry_once(&mut self) -> RpResult<()> {
        let dim = self.store.dim();
        let step = self.rng.gen_range(STEP_RANGE);
        let sdevs = vec![step; dim];

        let store = self.store;
        let objective = self.objective;
        let optimizer = self.optimizer;
        let rng = &mut self.rng;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            optimizer.minimize(objective, store.bounds(), None, &sdevs, rng, store)
        }))
        .map_err(|payload| OptimizerError::Panicked {
            message: panic_message(payload.as_ref()),
        })??;

        store.add_result(
            outcome.y,
            &outcome.x,
            outcome.evaluations,
            self.config.value_limit,
        )?;

        // The result is already recorded; a lost snapshot does not fail the retry.
        if let Some(name) = &self.config.snapshot_name {
            if let Err(e) = save_snapshot(&self.config.output_dir, name, store) {
                warn!(worker = self.worker_id, error = %e, "snapshot not saved");
            }
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Minimize `objective` within `bounds` using parallel optimization retry.
///
/// Fails only on invalid configuration or bounds; failures of individual
/// retries are logged and skipped.
pub fn minimize(
    objective: &dyn Objective,
    bounds: Bounds,
    optimizer: &dyn Optimizer,
    config: &RetryConfig,
) -> RpResult<OptimizeResult> {
    let store = Store::new(bounds, config)?;
    retry(&store, objective, optimizer, config)
}

/// Run `config.workers` retry loops against an existing store.
pub fn retry(
    store: &Store,
    objective: &dyn Objective,
    optimizer: &dyn Optimizer,
    config: &RetryConfig,
) -> RpResult<OptimizeResult> {
    config.validate()?;
    let seeds = config
        .seed
        .map(SeedStream::new)
        .unwrap_or_else(SeedStream::from_entropy);

    info!(
        run_id = %store.run_id(),
        optimizer = optimizer.name(),
        workers = config.workers,
        retries = config.num_retries,
        dim = store.dim(),
        seed = seeds.master(),
        "starting parallel retry"
    );

    let summaries = thread::scope(|scope| -> RpResult<Vec<WorkerSummary>> {
        let mut handles = Vec::with_capacity(config.workers);
        for (worker_id, rng) in seeds.spawn(config.workers).into_iter().enumerate() {
            let worker = RetryLoop::new(worker_id, store, objective, optimizer, config, rng);
            let handle = thread::Builder::new()
                .name(format!("retry-worker-{worker_id}"))
                .spawn_scoped(scope, move || worker.run())?;
            handles.push(handle);
        }

        let mut summaries = Vec::with_capacity(handles.len());
        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(summary) => summaries.push(summary),
                Err(payload) => warn!(
                    worker = worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "worker terminated abnormally"
                ),
            }
        }
        Ok(summaries)
    })?;

    store.evict();
    store.dump();

    let failed_retries = summaries.iter().map(|s| s.failed).sum();
    let (fun, x) = store.best();
    let result = OptimizeResult {
        x,
        fun,
        nfev: store.count_evals(),
        success: true,
        runs: store.count_runs(),
        accepted_runs: store.count_accepted(),
        failed_retries,
    };
    info!(
        run_id = %store.run_id(),
        best = result.fun,
        evaluations = result.nfev,
        runs = result.runs,
        failed = result.failed_retries,
        elapsed_secs = store.elapsed().as_secs_f64(),
        "parallel retry finished"
    );
    Ok(result)
}

/// Like [`minimize`], additionally saving the improvement trace as
/// `<name>_<optimizer>.improvements.json` and the part of it below
/// `plot_limit` as `<name>_<optimizer>.progress.improvements.json`.
pub fn minimize_with_trace(
    name: &str,
    objective: &dyn Objective,
    bounds: Bounds,
    optimizer: &dyn Optimizer,
    config: &RetryConfig,
    plot_limit: f64,
) -> RpResult<OptimizeResult> {
    if !config.statistics_enabled() {
        return Err(RpError::Config(
            "an improvement trace needs statistic_num > 0".to_string(),
        ));
    }
    let started = Instant::now();
    let name = format!("{name}_{}", optimizer.name());
    info!(run = %name, "optimize");

    let store = Store::new(bounds, config)?;
    let result = retry(&store, objective, optimizer, config)?;

    let improvements = store.improvements();
    save_improvements(&config.output_dir, &name, &improvements)?;
    let progress = filter_improvements(&improvements, plot_limit);
    save_improvements(&config.output_dir, &format!("{name}.progress"), &progress)?;

    info!(run = %name, elapsed_secs = started.elapsed().as_secs_f64(), "trace saved");
    Ok(result)
}
