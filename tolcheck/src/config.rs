//! Configuration types.
//!
//! [`ScanConfig`] controls discovery. [`ToleranceConfig`] holds the
//! per-test reference and tolerance entries as the user typed them and is
//! persisted as `test_config.json`; [`ToleranceConfig::resolve`] turns it
//! into validated numbers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tolcheck_naming::Unit;
use tracing::warn;

use crate::error::ConfigError;
use crate::model::{IoType, NO_RANGE, TestKey};
use crate::tolerance::{ResolvedConfig, TestConfig};

/// Tolerance applied to tests with no explicit entry.
pub const DEFAULT_TOLERANCE: f64 = 0.015;

/// Name of the configuration file picked up from an input directory.
pub const CONFIG_FILE_NAME: &str = "test_config.json";

/// Discovery options.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ScanConfig {
    /// Directory holding the measurement exports.
    pub input_dir: PathBuf,
    /// Descend into subdirectories (default: off).
    pub recursive: bool,
    /// Maximum traversal depth when `recursive` is set (default: 64).
    pub max_depth: usize,
    /// Exclude patterns (glob format), matched against the path and file name.
    pub exclude: Vec<String>,
    /// Maximum file size in bytes (default: 10 MB).
    pub max_file_size: u64,
}

impl ScanConfig {
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: false,
            max_depth: 64,
            exclude: Vec::new(),
            max_file_size: 10_485_760,
        }
    }
}

/// A number that may arrive as a JSON number or as text.
///
/// Text accepts a decimal comma (`"0,015"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    /// The numeric value, if it is a finite number.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for NumberOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for NumberOrString {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

fn deserialize_range<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|r| !r.is_empty() && r != NO_RANGE))
}

#[allow(clippy::ref_option)]
fn serialize_range<S: Serializer>(range: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(range.as_deref().unwrap_or(NO_RANGE))
}

/// One entry of `test_config.json`.
///
/// `test_value`, `range_setting` and `io_type` identify the test; the other
/// fields carry the user's input and fall back to defaults when missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub test_value: f64,
    #[serde(
        default,
        deserialize_with = "deserialize_range",
        serialize_with = "serialize_range"
    )]
    pub range_setting: Option<String>,
    pub io_type: IoType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<NumberOrString>,
}

impl ConfigEntry {
    #[must_use]
    pub fn key(&self) -> TestKey {
        TestKey::new(self.test_value, self.range_setting.clone(), self.io_type)
    }
}

/// On-disk layout of `test_config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub configurations: Vec<ConfigEntry>,
    /// Measurement type per text file name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measurement_types: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Json`] if it is not a valid config document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if `content` is not a valid config document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write the config as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })
    }
}

/// The user-editable part of one tolerance entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInput {
    /// Range override; `N/A` or empty means "no range".
    pub range_input: String,
    pub reference: NumberOrString,
    pub tolerance: NumberOrString,
}

/// Result of applying a config file to a [`ToleranceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Entries whose key matched a known test.
    pub applied: usize,
    /// Unit named by the file when it differs from the workspace unit.
    pub unit_mismatch: Option<String>,
}

/// Tolerance entries for every known test of a workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceConfig {
    pub unit: Unit,
    pub entries: BTreeMap<TestKey, EntryInput>,
    pub measurement_types: BTreeMap<String, String>,
}

impl ToleranceConfig {
    /// Default entries: range as decoded, reference = test value,
    /// tolerance = `default_tolerance`.
    #[must_use]
    pub fn with_defaults<'a>(
        keys: impl IntoIterator<Item = &'a TestKey>,
        unit: Unit,
        default_tolerance: f64,
    ) -> Self {
        let entries = keys
            .into_iter()
            .map(|key| {
                let input = EntryInput {
                    range_input: key.range_display().to_owned(),
                    reference: key.test_value.into(),
                    tolerance: default_tolerance.into(),
                };
                (key.clone(), input)
            })
            .collect();
        Self {
            unit,
            entries,
            measurement_types: BTreeMap::new(),
        }
    }

    /// Build a config that accepts every entry of `file`.
    #[must_use]
    pub fn from_file(file: &ConfigFile, unit: Unit) -> Self {
        let keys: Vec<TestKey> = file.configurations.iter().map(ConfigEntry::key).collect();
        let mut config = Self::with_defaults(&keys, unit, DEFAULT_TOLERANCE);
        config.merge_file(file);
        config
    }

    /// Apply the entries of `file` whose key is already known.
    ///
    /// Missing fields fall back to `N/A`, the test value and
    /// [`DEFAULT_TOLERANCE`]. A different unit is reported in the summary
    /// and logged, but the entries are still applied.
    pub fn merge_file(&mut self, file: &ConfigFile) -> MergeSummary {
        let unit_mismatch = file
            .unit
            .as_deref()
            .filter(|u| *u != self.unit.symbol())
            .map(str::to_owned);
        if let Some(other) = &unit_mismatch {
            warn!(
                file_unit = %other,
                unit = %self.unit,
                "Config file unit differs from the detected unit; applying it anyway"
            );
        }

        let mut applied = 0;
        for entry in &file.configurations {
            let key = entry.key();
            let Some(input) = self.entries.get_mut(&key) else {
                continue;
            };
            *input = EntryInput {
                range_input: entry
                    .range_input
                    .clone()
                    .unwrap_or_else(|| NO_RANGE.to_owned()),
                reference: entry
                    .reference
                    .clone()
                    .unwrap_or(NumberOrString::Number(key.test_value)),
                tolerance: entry
                    .tolerance
                    .clone()
                    .unwrap_or(NumberOrString::Number(DEFAULT_TOLERANCE)),
            };
            applied += 1;
        }

        self.measurement_types
            .extend(file.measurement_types.iter().map(|(k, v)| (k.clone(), v.clone())));

        MergeSummary {
            applied,
            unit_mismatch,
        }
    }

    /// The persisted form of this config.
    #[must_use]
    pub fn to_file(&self) -> ConfigFile {
        let configurations = self
            .entries
            .iter()
            .map(|(key, input)| ConfigEntry {
                test_value: key.test_value,
                range_setting: key.range.clone(),
                io_type: key.io_type,
                range_input: Some(input.range_input.clone()),
                reference: Some(input.reference.clone()),
                tolerance: Some(input.tolerance.clone()),
            })
            .collect();
        ConfigFile {
            unit: Some(self.unit.symbol().to_owned()),
            configurations,
            measurement_types: self.measurement_types.clone(),
        }
    }

    /// Validate every entry and produce the numeric configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] when a reference or tolerance
    /// is not a number and [`ConfigError::NegativeTolerance`] when a
    /// tolerance is below zero.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let mut resolved = ResolvedConfig::new();
        for (key, input) in &self.entries {
            let number = |field: &'static str, raw: &NumberOrString| {
                raw.to_f64().ok_or_else(|| ConfigError::InvalidNumber {
                    field,
                    value: raw.to_string(),
                    test_value: key.test_value,
                })
            };
            let reference = number("reference", &input.reference)?;
            let tolerance = number("tolerance", &input.tolerance)?;
            if tolerance < 0.0 {
                return Err(ConfigError::NegativeTolerance {
                    test_value: key.test_value,
                    unit: self.unit,
                    io_type: key.io_type,
                    tolerance,
                });
            }

            let range_input = input.range_input.trim();
            let range = (!range_input.is_empty() && !range_input.eq_ignore_ascii_case(NO_RANGE))
                .then(|| range_input.to_owned());

            resolved.insert(
                key.clone(),
                TestConfig {
                    range,
                    reference,
                    tolerance,
                },
            );
        }
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn keys() -> Vec<TestKey> {
        vec![
            TestKey::new(-2.5, Some("10V".to_owned()), IoType::Output),
            TestKey::new(10.0, None, IoType::Input),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        let resolved = config.resolve().unwrap();
        let out = &resolved[&keys()[0]];
        assert_eq!(out.range.as_deref(), Some("10V"));
        assert_eq!(out.reference, -2.5);
        assert_eq!(out.tolerance, 0.015);
        assert_eq!(resolved[&keys()[1]].range, None);
    }

    #[test]
    fn test_merge_applies_known_keys_only() {
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        let file = ConfigFile::from_json(
            r#"{
                "unit": "V",
                "configurations": [
                    {"test_value": -2.5, "range_setting": "10V", "io_type": "Output",
                     "range_input": "20V", "reference": "-2,49", "tolerance": 0.05},
                    {"test_value": 99.0, "range_setting": null, "io_type": "Input",
                     "range_input": "N/A", "reference": 99.0, "tolerance": 1.0}
                ]
            }"#,
        )
        .unwrap();

        let summary = config.merge_file(&file);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.unit_mismatch, None);

        let resolved = config.resolve().unwrap();
        let out = &resolved[&keys()[0]];
        assert_eq!(out.range.as_deref(), Some("20V"));
        assert_eq!(out.reference, -2.49);
        assert_eq!(out.tolerance, 0.05);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_merge_reports_unit_mismatch() {
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        let file = ConfigFile {
            unit: Some("mA".to_owned()),
            ..ConfigFile::default()
        };
        let summary = config.merge_file(&file);
        assert_eq!(summary.unit_mismatch.as_deref(), Some("mA"));
    }

    #[test]
    fn test_na_range_setting_matches_absent_range() {
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        let file = ConfigFile::from_json(
            r#"{"configurations": [
                {"test_value": 10.0, "range_setting": "N/A", "io_type": "Input", "tolerance": "0.2"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(config.merge_file(&file).applied, 1);
        let resolved = config.resolve().unwrap();
        let input = &resolved[&keys()[1]];
        assert_eq!(input.tolerance, 0.2);
        assert_eq!(input.reference, 10.0);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        config.entries.get_mut(&keys()[1]).unwrap().tolerance = NumberOrString::Number(-0.1);
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::NegativeTolerance { .. }));
        assert!(err.to_string().contains("10 V (Input)"), "got: {err}");
    }

    #[test]
    fn test_non_numeric_reference_rejected() {
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, DEFAULT_TOLERANCE);
        config.entries.get_mut(&keys()[0]).unwrap().reference = NumberOrString::Text("abc".to_owned());
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("reference"), "got: {err}");
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        let mut config = ToleranceConfig::with_defaults(&keys(), Unit::Volt, 0.1);
        config
            .measurement_types
            .insert("VIO_5V.txt".to_owned(), "MeanVoltage".to_owned());
        config.to_file().save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"range_setting\": \"N/A\""));

        let loaded = ConfigFile::load(&path).unwrap();
        let reloaded = ToleranceConfig::from_file(&loaded, Unit::Volt);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_number_or_string() {
        assert_eq!(NumberOrString::Text(" 0,5 ".to_owned()).to_f64(), Some(0.5));
        assert_eq!(NumberOrString::Text("x".to_owned()).to_f64(), None);
        assert_eq!(NumberOrString::Number(f64::NAN).to_f64(), None);
    }
}
