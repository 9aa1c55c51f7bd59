use ndarray::{Array1, ArrayView1};
use ndarray_stats::errors::MinMaxError;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Linear min-max rescale of `value` from `[observed_min, observed_max]` to
/// `[target_min, target_max]`, clamped to the target range.
///
/// A zero-width observed range carries no variation and maps everything to
/// `target_min`.
pub fn normalize(value: f64, observed_min: f64, observed_max: f64, target_min: f64, target_max: f64) -> f64 {
    if observed_max == observed_min {
        return target_min;
    }
    let scaled = (value - observed_min) * (target_max - target_min) / (observed_max - observed_min) + target_min;
    scaled.clamp(target_min, target_max)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        // also rejects NaN bounds
        if !(min < max) {
            return Err(Error::InvalidTargetRange { min, max });
        }
        Ok(TargetRange { min, max })
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// Batch-local bounds plus the target range, computed once per batch and
/// then applied to every sample of that batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationRange {
    pub observed_min: f64,
    pub observed_max: f64,
    pub target: TargetRange,
}

impl NormalizationRange {
    pub fn new(observed_min: f64, observed_max: f64, target: TargetRange) -> Self {
        NormalizationRange {
            observed_min,
            observed_max,
            target,
        }
    }

    pub fn from_signal(signal: ArrayView1<f64>, target: TargetRange) -> Result<Self> {
        let observed_min = *signal.min().map_err(min_max_error)?;
        let observed_max = *signal.max().map_err(min_max_error)?;
        if !observed_min.is_finite() || !observed_max.is_finite() {
            return Err(Error::NonFiniteSignal);
        }
        Ok(Self::new(observed_min, observed_max, target))
    }

    pub fn is_degenerate(&self) -> bool {
        self.observed_min == self.observed_max
    }

    pub fn apply(&self, value: f64) -> f64 {
        normalize(value, self.observed_min, self.observed_max, self.target.min, self.target.max)
    }

    pub fn apply_all(&self, signal: ArrayView1<f64>) -> Array1<f64> {
        signal.mapv(|x| self.apply(x))
    }
}

fn min_max_error(err: MinMaxError) -> Error {
    match err {
        MinMaxError::EmptyInput => Error::EmptyBatch,
        MinMaxError::UndefinedOrder => Error::NonFiniteSignal,
    }
}
