//! Benchmark runner: minimizes a test function with parallel retry.
//!
//! Usage: `rp-retry-bench [config.json]`
//!
//! The optional JSON file holds a `RetryConfig`; missing fields use the
//! defaults. Environment variables override both:
//! - `REPRISE_FUNCTION`   `rastrigin` (default), `sphere` or `rosenbrock`
//! - `REPRISE_DIM`        problem dimension (default 6)
//! - `REPRISE_MAX_EVALS`  evaluation budget per retry (default 20000)
//! - `REPRISE_RETRIES`, `REPRISE_WORKERS`, `REPRISE_SEED`, `REPRISE_STATS`
//! - `REPRISE_TRACE`      run name; saves the improvement trace when set

use anyhow::{bail, Context, Result};
use std::env;
use std::f64::consts::PI;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rp_retry::{minimize, minimize_with_trace, Bounds, OnePlusOne, RetryConfig};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn rastrigin(x: &[f64]) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|xi| xi * xi - 10.0 * (2.0 * PI * xi).cos())
            .sum::<f64>()
}

fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|xi| xi * xi).sum()
}

fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

fn load_config() -> Result<RetryConfig> {
    let mut config = match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
        }
        None => RetryConfig::default().with_num_retries(64),
    };
    if let Some(n) = env_parse("REPRISE_RETRIES") {
        config.num_retries = n;
    }
    if let Some(n) = env_parse("REPRISE_WORKERS") {
        config.workers = n;
    }
    if let Some(seed) = env_parse("REPRISE_SEED") {
        config.seed = Some(seed);
    }
    if let Some(n) = env_parse("REPRISE_STATS") {
        config.statistic_num = n;
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let dim: usize = env_parse("REPRISE_DIM").unwrap_or(6);
    let max_evals: usize = env_parse("REPRISE_MAX_EVALS").unwrap_or(20_000);
    let function = env::var("REPRISE_FUNCTION").unwrap_or_else(|_| "rastrigin".to_string());

    let (objective, bounds): (fn(&[f64]) -> f64, Bounds) = match function.as_str() {
        "rastrigin" => (rastrigin, Bounds::uniform(dim, -5.12, 5.12)?),
        "sphere" => (sphere, Bounds::uniform(dim, -5.0, 5.0)?),
        "rosenbrock" => (rosenbrock, Bounds::uniform(dim, -2.0, 2.0)?),
        other => bail!("unknown benchmark function {other}"),
    };
    let optimizer = OnePlusOne::new(max_evals).with_stop_fitness(config.stop_fitness);

    info!(function = %function, dim, max_evals, "running benchmark");
    let result = match env::var("REPRISE_TRACE") {
        Ok(name) => {
            let config = if config.statistics_enabled() {
                config
            } else {
                config.with_statistic_num(5000)
            };
            minimize_with_trace(&name, &objective, bounds, &optimizer, &config, f64::INFINITY)?
        }
        Err(_) => minimize(&objective, bounds, &optimizer, &config)?,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
