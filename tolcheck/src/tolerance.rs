//! PASS/FAIL evaluation against reference ± tolerance.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Evaluation, Limits, ResultRow, TestKey, Verdict};
use crate::stats::MeasurementStats;

/// Validated configuration for one test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestConfig {
    /// Range shown in reports instead of the decoded one, when set.
    pub range: Option<String>,
    pub reference: f64,
    /// Non-negative half-width of the acceptance window.
    pub tolerance: f64,
}

/// Validated configuration for every known test.
pub type ResolvedConfig = BTreeMap<TestKey, TestConfig>;

impl TestConfig {
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            reference: self.reference,
            tolerance: self.tolerance,
            lower: self.reference - self.tolerance,
            upper: self.reference + self.tolerance,
        }
    }
}

impl Limits {
    /// PASS iff `lower <= mean <= upper`.
    #[must_use]
    pub fn mean_check(&self, mean: f64) -> Verdict {
        Verdict::from_bool(self.lower <= mean && mean <= self.upper)
    }

    /// PASS iff `lower <= mean - 2σ` and `mean + 2σ <= upper`.
    /// An undefined σ fails.
    #[must_use]
    pub fn sigma_check(&self, mean: f64, std_dev: Option<f64>) -> Verdict {
        Verdict::from_bool(std_dev.is_some_and(|s| {
            self.lower <= mean - 2.0 * s && mean + 2.0 * s <= self.upper
        }))
    }
}

/// Evaluate statistics against an optional configuration.
///
/// Without a configuration there are no limits and both checks fail.
#[must_use]
pub fn evaluate(stats: &MeasurementStats, config: Option<&TestConfig>) -> Evaluation {
    match config {
        Some(config) => {
            let limits = config.limits();
            Evaluation {
                mean_check: limits.mean_check(stats.mean),
                sigma_check: limits.sigma_check(stats.mean, stats.std_dev),
                limits: Some(limits),
            }
        }
        None => Evaluation {
            limits: None,
            mean_check: Verdict::Fail,
            sigma_check: Verdict::Fail,
        },
    }
}

/// Attach limits and checks to every row.
///
/// Rows are matched on the range decoded from their file name; a configured
/// range then replaces the displayed one.
pub fn apply_limits(rows: &mut [ResultRow], resolved: &ResolvedConfig) {
    for row in rows {
        let config = resolved.get(&row.config_key());
        if let Some(range) = config.and_then(|c| c.range.as_ref()) {
            row.range_display.clone_from(range);
        }
        row.evaluation = Some(evaluate(&row.stats, config));
    }
}
