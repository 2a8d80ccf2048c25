//! Optimizer and objective contracts, plus two reference optimizers.
//!
//! Production solvers (differential evolution, CMA-ES, native libraries) plug
//! in through [`Optimizer`]. [`RandomSampling`] and [`OnePlusOne`] are small
//! self-contained implementations used by the benchmark binary and the tests.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use rp_types::{Bounds, OptimizerError, RetryResult, RpResult};

use crate::store::Store;

/// Objective function `f: R^n -> R` to be minimized.
///
/// Called from every worker thread at once, so implementations must be
/// stateless or internally synchronized.
pub trait Objective: Send + Sync {
    fn eval(&self, x: &[f64]) -> f64;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn eval(&self, x: &[f64]) -> f64 {
        self(x)
    }
}

/// A local optimizer that can take part in parallel retry.
pub trait Optimizer: Send + Sync {
    /// Run one optimization from `guess`, or from a point of the optimizer's
    /// choosing when `guess` is `None`.
    ///
    /// `sdevs` holds the initial step size per dimension as a fraction of the
    /// bounds width. `store` gives read access to the shared results of all
    /// workers; only its locked accessors may be used.
    fn minimize(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        guess: Option<&[f64]>,
        sdevs: &[f64],
        rng: &mut ChaCha8Rng,
        store: &Store,
    ) -> RpResult<RetryResult>;

    /// Human-readable optimizer name.
    fn name(&self) -> &str;
}

/// Uniformly random point inside `bounds`.
pub fn uniform_point(bounds: &Bounds, rng: &mut ChaCha8Rng) -> Vec<f64> {
    bounds
        .lower()
        .iter()
        .zip(bounds.upper())
        .map(|(&lo, &hi)| if lo < hi { rng.gen_range(lo..=hi) } else { lo })
        .collect()
}

fn check_dim(bounds: &Bounds, actual: usize) -> RpResult<()> {
    if actual != bounds.dim() {
        return Err(OptimizerError::DimensionMismatch {
            expected: bounds.dim(),
            actual,
        }
        .into());
    }
    Ok(())
}

// ---- Random sampling ----

/// Independent uniform samples across the bounds; returns the best one.
#[derive(Debug, Clone)]
pub struct RandomSampling {
    pub samples: usize,
}

impl RandomSampling {
    pub fn new(samples: usize) -> Self {
        Self { samples }
    }
}

impl Optimizer for RandomSampling {
    fn minimize(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        guess: Option<&[f64]>,
        _sdevs: &[f64],
        rng: &mut ChaCha8Rng,
        _store: &Store,
    ) -> RpResult<RetryResult> {
        if self.samples == 0 {
            return Err(OptimizerError::Failed {
                optimizer: self.name().to_string(),
                message: "sample count must be positive".to_string(),
            }
            .into());
        }

        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut evaluations = 0;
        if let Some(guess) = guess {
            check_dim(bounds, guess.len())?;
            let y = objective.eval(guess);
            evaluations += 1;
            best = Some((guess.to_vec(), y));
        }
        while evaluations < self.samples {
            let x = uniform_point(bounds, rng);
            let y = objective.eval(&x);
            evaluations += 1;
            let improved = match &best {
                Some((_, best_y)) => y < *best_y || best_y.is_nan(),
                None => true,
            };
            if improved {
                best = Some((x, y));
            }
        }

        let (x, y) = best.ok_or_else(|| rp_types::internal_error!("no sample evaluated"))?;
        Ok(RetryResult::new(x, y, evaluations))
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- (1+1) evolution strategy ----

/// Step size multiplier after a successful mutation; failures shrink by
/// `SUCCESS_FACTOR^(-1/4)`, which holds the success rate near 1/5.
const SUCCESS_FACTOR: f64 = 1.5;

/// Smallest absolute step before a run is considered converged.
const MIN_STEP: f64 = 1e-14;

/// (1+1) evolution strategy with the 1/5th success rule.
///
/// Gaussian mutations are scaled per dimension by `sdevs * (upper - lower)`
/// and clamped to the bounds. With `restart_from_best > 0` a retry starts
/// from the store's current best solution with that probability, otherwise
/// from a uniform random point.
#[derive(Debug, Clone)]
pub struct OnePlusOne {
    pub max_evaluations: usize,
    pub stop_fitness: f64,
    pub restart_from_best: f64,
}

impl OnePlusOne {
    pub fn new(max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            stop_fitness: f64::NEG_INFINITY,
            restart_from_best: 0.0,
        }
    }

    pub fn with_stop_fitness(mut self, stop_fitness: f64) -> Self {
        self.stop_fitness = stop_fitness;
        self
    }

    pub fn with_restart_from_best(mut self, probability: f64) -> Self {
        self.restart_from_best = probability.clamp(0.0, 1.0);
        self
    }

    fn start_point(
        &self,
        bounds: &Bounds,
        guess: Option<&[f64]>,
        rng: &mut ChaCha8Rng,
        store: &Store,
    ) -> RpResult<Vec<f64>> {
        if let Some(guess) = guess {
            check_dim(bounds, guess.len())?;
            let mut x = guess.to_vec();
            bounds.clamp(&mut x);
            return Ok(x);
        }
        if self.restart_from_best > 0.0 && rng.gen::<f64>() < self.restart_from_best {
            let best = store.best_x();
            if best.len() == bounds.dim() {
                return Ok(best);
            }
        }
        Ok(uniform_point(bounds, rng))
    }
}

impl Optimizer for OnePlusOne {
    fn minimize(
        &self,
        objective: &dyn Objective,
        bounds: &Bounds,
        guess: Option<&[f64]>,
        sdevs: &[f64],
        rng: &mut ChaCha8Rng,
        store: &Store,
    ) -> RpResult<RetryResult> {
        check_dim(bounds, sdevs.len())?;
        if self.max_evaluations == 0 {
            return Err(OptimizerError::Failed {
                optimizer: self.name().to_string(),
                message: "evaluation budget must be positive".to_string(),
            }
            .into());
        }

        let scale: Vec<f64> = sdevs
            .iter()
            .zip(bounds.delta())
            .map(|(s, d)| s * d)
            .collect();
        let max_scale = scale.iter().cloned().fold(0.0, f64::max);

        let mut x = self.start_point(bounds, guess, rng, store)?;
        let mut y = objective.eval(&x);
        let mut evaluations = 1;
        let mut sigma = 1.0;
        let failure_factor = SUCCESS_FACTOR.powf(-0.25);

        while evaluations < self.max_evaluations && y > self.stop_fitness {
            if sigma * max_scale < MIN_STEP {
                break;
            }
            let mut candidate: Vec<f64> = x
                .iter()
                .zip(&scale)
                .map(|(xi, s)| {
                    let z: f64 = rng.sample(StandardNormal);
                    xi + sigma * s * z
                })
                .collect();
            bounds.clamp(&mut candidate);

            let candidate_y = objective.eval(&candidate);
            evaluations += 1;
            if candidate_y <= y || y.is_nan() {
                x = candidate;
                y = candidate_y;
                sigma *= SUCCESS_FACTOR;
            } else {
                sigma *= failure_factor;
            }
        }

        Ok(RetryResult::new(x, y, evaluations))
    }

    fn name(&self) -> &str {
        "one_plus_one"
    }
}
