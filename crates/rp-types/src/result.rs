//! Results produced by single retries and by a whole run.

use serde::{Deserialize, Serialize};

/// Output of one optimizer invocation, consumed immediately by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryResult {
    pub x: Vec<f64>,
    pub y: f64,
    pub evaluations: usize,
}

impl RetryResult {
    pub fn new(x: Vec<f64>, y: f64, evaluations: usize) -> Self {
        Self { x, y, evaluations }
    }
}

/// Overall answer of a parallel retry run.
///
/// `success` is always `true` once the workers have been joined. A run in
/// which every retry failed reports `fun = +inf` and an empty `x`; check
/// `failed_retries` and `accepted_runs` to tell it apart from a run without
/// any result under the value limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// Best solution found.
    pub x: Vec<f64>,
    /// Best fitness found.
    pub fun: f64,
    /// Total number of objective evaluations.
    pub nfev: u64,
    pub success: bool,
    /// Retries granted to workers.
    pub runs: usize,
    /// Retries whose result passed the value limit.
    pub accepted_runs: usize,
    /// Retries that returned an error or panicked.
    pub failed_retries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_result_serialization() {
        let result = OptimizeResult {
            x: vec![0.5, -0.25],
            fun: 1.5,
            nfev: 12_000,
            success: true,
            runs: 16,
            accepted_runs: 15,
            failed_retries: 1,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: OptimizeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
