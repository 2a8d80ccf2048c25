//! Box constraints on the objective function arguments.

use serde::{Deserialize, Serialize};

use crate::errors::{RpError, RpResult};

/// Validated lower/upper limits, one pair per dimension.
///
/// Construction rejects missing (empty), non-finite and malformed limits so a
/// run fails before any worker is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl TryFrom<RawBounds> for Bounds {
    type Error = RpError;

    fn try_from(raw: RawBounds) -> RpResult<Self> {
        Bounds::new(raw.lower, raw.upper)
    }
}

impl From<Bounds> for RawBounds {
    fn from(bounds: Bounds) -> Self {
        Self {
            lower: bounds.lower,
            upper: bounds.upper,
        }
    }
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> RpResult<Self> {
        if lower.is_empty() && upper.is_empty() {
            return Err(crate::config_error!("bounds need to be defined"));
        }
        if lower.len() != upper.len() {
            return Err(crate::config_error!(
                "bounds dimension mismatch: {} lower limits, {} upper limits",
                lower.len(),
                upper.len()
            ));
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(crate::config_error!(
                    "bounds should be real valued (min, max) pairs, dimension {i} is ({lo}, {hi})"
                ));
            }
            if lo > hi {
                return Err(crate::config_error!(
                    "lower bound {lo} exceeds upper bound {hi} in dimension {i}"
                ));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Build bounds from a sequence of `(min, max)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> RpResult<Self> {
        let (lower, upper) = pairs.iter().copied().unzip();
        Self::new(lower, upper)
    }

    /// Same limits for every dimension.
    pub fn uniform(dim: usize, lower: f64, upper: f64) -> RpResult<Self> {
        Self::new(vec![lower; dim], vec![upper; dim])
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Width of the box per dimension.
    pub fn delta(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .collect()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }

    /// Clamp `x` into the box in place.
    pub fn clamp(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.clamp(*lo, *hi);
        }
    }
}
