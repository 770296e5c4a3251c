//! Summary statistics over one channel's samples.

use serde::Serialize;

/// Mean, sample standard deviation, extremes and count of a sample set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1). Undefined for a single sample.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

impl MeasurementStats {
    /// Compute statistics over `values`, ignoring NaN entries.
    ///
    /// Returns `None` when no sample remains.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let samples: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let n = samples.len();
        if n == 0 {
            return None;
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = (n > 1).then(|| {
            let sum_sq: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        });

        Some(Self {
            mean,
            std_dev,
            min,
            max,
            samples: n,
        })
    }
}
