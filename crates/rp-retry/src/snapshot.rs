//! Persisted run artifacts: store snapshots and improvement traces.
//!
//! Files are plain JSON keyed by the run name, meant for external plotting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use rp_types::RpResult;

use crate::store::Store;

/// All entries of a store at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub run: String,
    pub run_id: Uuid,
    pub taken_at: DateTime<Utc>,
    pub count_evals: u64,
    pub count_runs: usize,
    pub best_x: Vec<f64>,
    /// `None` until a result has been accepted.
    pub best_y: Option<f64>,
    pub xs: Vec<Vec<f64>>,
    pub ys: Vec<f64>,
}

/// Improvement trace as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementFile {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    /// (elapsed seconds, fitness) pairs.
    pub improvements: Vec<(f64, f64)>,
}

/// Write through a temporary file in the target directory and rename it into
/// place, so concurrent writers of the same path never interleave.
fn write_json<T: Serialize>(path: &Path, value: &T) -> RpResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(value)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&json)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write the current store contents to `<dir>/<name>_retry_<evals>.json`.
pub fn save_snapshot(dir: &Path, name: &str, store: &Store) -> RpResult<PathBuf> {
    let snapshot = store.snapshot(name);
    let path = dir.join(format!("{name}_retry_{}.json", snapshot.count_evals));
    write_json(&path, &snapshot)?;
    debug!(path = %path.display(), entries = snapshot.ys.len(), "saved store snapshot");
    Ok(path)
}

pub fn load_snapshot(path: &Path) -> RpResult<StoreSnapshot> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write an improvement trace to `<dir>/<name>.improvements.json`.
pub fn save_improvements(
    dir: &Path,
    name: &str,
    improvements: &[(f64, f64)],
) -> RpResult<PathBuf> {
    let path = dir.join(format!("{name}.improvements.json"));
    let file = ImprovementFile {
        name: name.to_string(),
        saved_at: Utc::now(),
        improvements: improvements.to_vec(),
    };
    write_json(&path, &file)?;
    debug!(path = %path.display(), points = improvements.len(), "saved improvement trace");
    Ok(path)
}

pub fn load_improvements(path: &Path) -> RpResult<Vec<(f64, f64)>> {
    let bytes = fs::read(path)?;
    let file: ImprovementFile = serde_json::from_slice(&bytes)?;
    Ok(file.improvements)
}

/// Improvements with fitness below `plot_limit`; the full trace if none are.
pub fn filter_improvements(improvements: &[(f64, f64)], plot_limit: f64) -> Vec<(f64, f64)> {
    let filtered: Vec<(f64, f64)> = improvements
        .iter()
        .copied()
        .filter(|(_, y)| *y < plot_limit)
        .collect();
    if filtered.is_empty() {
        improvements.to_vec()
    } else {
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_types::{Bounds, RetryConfig};

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetryConfig::new().with_log_progress(false);
        let store = Store::new(Bounds::uniform(2, -1.0, 1.0).unwrap(), &config).unwrap();
        store.add_result(0.75, &[0.5, 0.25], 40, f64::INFINITY).unwrap();
        store.add_result(0.25, &[0.1, 0.2], 60, f64::INFINITY).unwrap();

        let path = save_snapshot(dir.path(), "sphere", &store).unwrap();
        assert_eq!(path.file_name().unwrap(), "sphere_retry_100.json");

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.run, "sphere");
        assert_eq!(loaded.ys, vec![0.75, 0.25]);
        assert_eq!(loaded.xs, vec![vec![0.5, 0.25], vec![0.1, 0.2]]);
        assert_eq!(loaded.best_y, Some(0.25));
        assert_eq!(loaded.best_x, vec![0.1, 0.2]);
    }

    #[test]
    fn empty_store_snapshot_has_no_best() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetryConfig::new().with_log_progress(false);
        let store = Store::new(Bounds::uniform(1, 0.0, 1.0).unwrap(), &config).unwrap();
        let path = save_snapshot(&dir.path().join("nested"), "empty", &store).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.best_y, None);
        assert!(loaded.ys.is_empty());
    }

    #[test]
    fn concurrent_saves_of_one_name_stay_readable() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetryConfig::new().with_log_progress(false);
        let store = Store::new(Bounds::uniform(3, -1.0, 1.0).unwrap(), &config).unwrap();
        for i in 0..20 {
            let v = i as f64 / 20.0;
            store.add_result(v, &[v, -v, v], 5, f64::INFINITY).unwrap();
        }

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        save_snapshot(dir.path(), "shared", &store).unwrap();
                    }
                });
            }
        });

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["shared_retry_100.json"]);
        let loaded = load_snapshot(&dir.path().join("shared_retry_100.json")).unwrap();
        assert_eq!(loaded.ys.len(), store.num_stored());
        assert_eq!(loaded.best_y, Some(0.0));
    }

    #[test]
    fn improvements_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let trace = vec![(0.1, 10.0), (0.5, 4.0), (2.0, 1.5)];
        let path = save_improvements(dir.path(), "rastrigin_one_plus_one", &trace).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "rastrigin_one_plus_one.improvements.json"
        );
        assert_eq!(load_improvements(&path).unwrap(), trace);
    }

    #[test]
    fn filter_keeps_values_below_limit() {
        let trace = vec![(0.1, 10.0), (0.5, 4.0), (2.0, 1.5)];
        assert_eq!(filter_improvements(&trace, 5.0), vec![(0.5, 4.0), (2.0, 1.5)]);
        assert_eq!(filter_improvements(&trace, f64::INFINITY), trace);
    }

    #[test]
    fn filter_falls_back_to_full_trace() {
        let trace = vec![(0.1, 10.0), (0.5, 4.0)];
        assert_eq!(filter_improvements(&trace, 1.0), trace);
    }
}
