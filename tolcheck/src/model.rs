//! Core data types shared by the pipeline and the report writers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stats::MeasurementStats;

/// Display string for an absent range setting.
pub const NO_RANGE: &str = "N/A";

/// Direction of a measurement, decided by the export format.
///
/// TXT exports come from input devices (voltmeters), CSV exports from
/// output devices (power supplies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IoType {
    Input,
    Output,
}

impl IoType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
        }
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IoType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Input" => Ok(Self::Input),
            "Output" => Ok(Self::Output),
            other => Err(ConfigError::InvalidIoType(other.to_owned())),
        }
    }
}

/// Outcome of one tolerance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    #[must_use]
    pub fn from_bool(pass: bool) -> Self {
        if pass { Self::Pass } else { Self::Fail }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    #[must_use]
    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one tolerance configuration: test value, range setting as
/// decoded from the file name, and I/O type.
///
/// Equality and hashing use the bit pattern of the test value (with `-0.0`
/// folded into `0.0`), so keys decoded from file names and keys read back
/// from a config file compare equal.
#[derive(Debug, Clone, Serialize)]
pub struct TestKey {
    pub test_value: f64,
    pub range: Option<String>,
    pub io_type: IoType,
}

impl TestKey {
    #[must_use]
    pub fn new(test_value: f64, range: Option<String>, io_type: IoType) -> Self {
        let test_value = if test_value == 0.0 { 0.0 } else { test_value };
        Self {
            test_value,
            range: range.filter(|r| !r.is_empty() && r != NO_RANGE),
            io_type,
        }
    }

    /// Range as shown to users (`N/A` when absent).
    #[must_use]
    pub fn range_display(&self) -> &str {
        self.range.as_deref().unwrap_or(NO_RANGE)
    }
}

impl PartialEq for TestKey {
    fn eq(&self, other: &Self) -> bool {
        self.test_value.to_bits() == other.test_value.to_bits()
            && self.range == other.range
            && self.io_type == other.io_type
    }
}

impl Eq for TestKey {}

impl Hash for TestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.test_value.to_bits().hash(state);
        self.range.hash(state);
        self.io_type.hash(state);
    }
}

impl Ord for TestKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.test_value
            .total_cmp(&other.test_value)
            .then_with(|| self.io_type.cmp(&other.io_type))
            .then_with(|| {
                self.range
                    .as_deref()
                    .unwrap_or("")
                    .cmp(other.range.as_deref().unwrap_or(""))
            })
    }
}

impl PartialOrd for TestKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reference, tolerance and the derived acceptance window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Limits {
    pub reference: f64,
    pub tolerance: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Checks attached to a row once limits are enabled.
///
/// `limits` is `None` when no configuration matched the row; both checks
/// then fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub limits: Option<Limits>,
    pub mean_check: Verdict,
    pub sigma_check: Verdict,
}

/// One line of the Test Results sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub channel: u32,
    pub io_type: IoType,
    /// Range decoded from the file name, used for configuration lookup.
    pub range_key: Option<String>,
    /// Range shown in reports; replaced by the configured range when set.
    pub range_display: String,
    pub test_value: f64,
    pub stats: MeasurementStats,
    pub evaluation: Option<Evaluation>,
}

impl ResultRow {
    #[must_use]
    pub fn new(
        channel: u32,
        io_type: IoType,
        range_key: Option<String>,
        test_value: f64,
        stats: MeasurementStats,
    ) -> Self {
        let range_display = range_key.clone().unwrap_or_else(|| NO_RANGE.to_owned());
        Self {
            channel,
            io_type,
            range_key,
            range_display,
            test_value,
            stats,
            evaluation: None,
        }
    }

    /// Key used to look up this row's tolerance configuration.
    #[must_use]
    pub fn config_key(&self) -> TestKey {
        TestKey::new(self.test_value, self.range_key.clone(), self.io_type)
    }

    /// Mean minus two standard deviations, when σ is defined.
    #[must_use]
    pub fn lower_2sigma(&self) -> Option<f64> {
        self.stats.std_dev.map(|s| self.stats.mean - 2.0 * s)
    }

    /// Mean plus two standard deviations, when σ is defined.
    #[must_use]
    pub fn upper_2sigma(&self) -> Option<f64> {
        self.stats.std_dev.map(|s| self.stats.mean + 2.0 * s)
    }

    /// Report ordering: channel, I/O type, displayed range, test value.
    #[must_use]
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.channel
            .cmp(&other.channel)
            .then_with(|| self.io_type.cmp(&other.io_type))
            .then_with(|| self.range_display.cmp(&other.range_display))
            .then_with(|| self.test_value.total_cmp(&other.test_value))
    }
}

/// Format a number the way test values appear in chart titles and filters:
/// whole numbers keep one decimal (`10.0`), others use the shortest form.
#[must_use]
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_key_equality_ignores_negative_zero() {
        let a = TestKey::new(0.0, None, IoType::Input);
        let b = TestKey::new(-0.0, None, IoType::Input);
        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_key_treats_na_as_no_range() {
        let key = TestKey::new(5.0, Some("N/A".to_owned()), IoType::Output);
        assert_eq!(key.range, None);
        assert_eq!(key.range_display(), "N/A");
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            TestKey::new(10.0, Some("10V".to_owned()), IoType::Output),
            TestKey::new(10.0, None, IoType::Input),
            TestKey::new(-2.5, Some("10V".to_owned()), IoType::Output),
            TestKey::new(10.0, Some("1V".to_owned()), IoType::Input),
        ];
        keys.sort();
        let order: Vec<_> = keys
            .iter()
            .map(|k| (k.test_value.to_string(), k.io_type, k.range_display().to_owned()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("-2.5".to_owned(), IoType::Output, "10V".to_owned()),
                ("10".to_owned(), IoType::Input, "N/A".to_owned()),
                ("10".to_owned(), IoType::Input, "1V".to_owned()),
                ("10".to_owned(), IoType::Output, "10V".to_owned()),
            ]
        );
    }

    #[test]
    fn test_io_type_parse() {
        assert_eq!("Output".parse::<IoType>().unwrap(), IoType::Output);
        assert!("output".parse::<IoType>().is_err());
    }

    #[test]
    fn test_verdict_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"PASS\"");
        assert_eq!(Verdict::from_bool(false), Verdict::Fail);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(10.0), "10.0");
        assert_eq!(format_value(-2.5), "-2.5");
        assert_eq!(format_value(0.7), "0.7");
    }
}
