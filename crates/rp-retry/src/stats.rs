//! Running fitness statistics and the improvement trace.

use rp_types::{RpError, RpResult};

/// Single-pass (Welford) mean and deviation over accepted fitness values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    sum_squared_dev: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        let diff = y - self.mean;
        self.sum_squared_dev += (n - 1.0) * diff * diff / n;
        self.mean += diff / n;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance; 0 before any value was pushed.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_squared_dev / self.count as f64
        }
    }

    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Fixed-capacity record of (elapsed seconds, fitness) pairs, one per new best.
///
/// Once full, the last slot is overwritten so the trace always ends with the
/// most recent improvement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementTrace {
    capacity: usize,
    entries: Vec<(f64, f64)>,
}

impl ImprovementTrace {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, elapsed: f64, y: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() < self.capacity {
            self.entries.push((elapsed, y));
        } else if let Some(last) = self.entries.last_mut() {
            *last = (elapsed, y);
        }
    }

    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-so-far value at `bucket_count` evenly spaced times.
    ///
    /// Bucket `i` ends at `(i + 1) * t_last / bucket_count` and carries the
    /// last value recorded at or before that time. Buckets ending before the
    /// first improvement take the first recorded value.
    pub fn resample(&self, bucket_count: usize) -> RpResult<Vec<f64>> {
        let Some(&(t_last, _)) = self.entries.last() else {
            return Err(RpError::Statistics(
                "no improvements recorded yet".to_string(),
            ));
        };

        let mut samples = Vec::with_capacity(bucket_count);
        let mut next = 0;
        let mut value = self.entries[0].1;
        for i in 0..bucket_count {
            let boundary = if i + 1 == bucket_count {
                t_last
            } else {
                t_last * (i + 1) as f64 / bucket_count as f64
            };
            while next < self.entries.len() && self.entries[next].0 <= boundary {
                value = self.entries[next].1;
                next += 1;
            }
            samples.push(value);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_stats(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn welford_matches_full_recompute() {
        let values = [3.5, -1.25, 8.0, 0.0, 12.75, 3.5, -7.0, 1e3, 42.0];
        let mut stats = RunningStats::new();
        for v in values {
            stats.push(v);
        }
        let (mean, sdev) = reference_stats(&values);
        assert_eq!(stats.count(), values.len());
        assert!((stats.mean() - mean).abs() < 1e-9);
        assert!((stats.standard_deviation() - sdev).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = RunningStats::new();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.standard_deviation(), 0.0);
    }

    #[test]
    fn single_value_has_zero_deviation() {
        let mut stats = RunningStats::new();
        stats.push(4.0);
        assert_eq!(stats.mean(), 4.0);
        assert_eq!(stats.standard_deviation(), 0.0);
    }

    #[test]
    fn trace_overwrites_last_slot_when_full() {
        let mut trace = ImprovementTrace::new(3);
        for (i, y) in [10.0, 8.0, 5.0, 2.0, 1.0].into_iter().enumerate() {
            trace.record(i as f64, y);
        }
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.entries(), &[(0.0, 10.0), (1.0, 8.0), (4.0, 1.0)]);
    }

    #[test]
    fn resample_requires_improvements() {
        let trace = ImprovementTrace::new(10);
        assert!(matches!(trace.resample(5), Err(RpError::Statistics(_))));
    }

    #[test]
    fn resample_is_a_step_function() {
        let mut trace = ImprovementTrace::new(10);
        trace.record(1.0, 9.0);
        trace.record(2.0, 6.0);
        trace.record(7.0, 4.0);
        trace.record(10.0, 1.0);

        // boundaries: 2, 4, 6, 8, 10
        let samples = trace.resample(5).unwrap();
        assert_eq!(samples, vec![6.0, 6.0, 6.0, 4.0, 1.0]);
    }

    #[test]
    fn resample_before_first_improvement_uses_first_value() {
        let mut trace = ImprovementTrace::new(10);
        trace.record(5.0, 3.0);
        trace.record(10.0, 2.0);

        // boundaries: 2.5, 5, 7.5, 10
        let samples = trace.resample(4).unwrap();
        assert_eq!(samples, vec![3.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn resample_is_monotone_and_sized() {
        let mut trace = ImprovementTrace::new(100);
        let mut y = 100.0;
        for i in 0..40 {
            y *= 0.8;
            trace.record(0.37 * i as f64 + 0.01 * (i * i) as f64, y);
        }
        let samples = trace.resample(17).unwrap();
        assert_eq!(samples.len(), 17);
        assert!(samples.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*samples.last().unwrap(), y);
    }

    #[test]
    fn resample_zero_buckets_is_empty() {
        let mut trace = ImprovementTrace::new(2);
        trace.record(1.0, 1.0);
        assert!(trace.resample(0).unwrap().is_empty());
    }
}
