//! Workspace inspection ahead of processing.
//!
//! Answers the questions the user must settle before a run: which unit the
//! files use, which tests need a tolerance entry, and which text exports
//! carry more than one measurement type.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tolcheck_naming::{Unit, detect_unit, parse_filename};
use tracing::{debug, warn};

use crate::config::{ScanConfig, ToleranceConfig};
use crate::discovery::{DataFile, Discovery, find_data_files};
use crate::ingest::{read_file_bounded, scan_measurement_types};
use crate::model::{IoType, TestKey};

/// What a workspace holds, before any configuration is applied.
#[derive(Debug, Clone)]
pub struct WorkspaceScan {
    pub input_dir: PathBuf,
    pub unit: Unit,
    pub discovery: Discovery,
    /// Measurement types found per text file, keyed by [`DataFile::key`]
    /// (files with none are absent).
    pub measurement_types: BTreeMap<String, BTreeSet<String>>,
    /// Tests that need a tolerance entry, in display order.
    pub test_keys: BTreeSet<TestKey>,
}

impl WorkspaceScan {
    /// Text files that carry more than one measurement type.
    #[must_use]
    pub fn multi_type_files(&self) -> BTreeMap<String, Vec<String>> {
        self.measurement_types
            .iter()
            .filter(|(_, types)| types.len() > 1)
            .map(|(name, types)| (name.clone(), types.iter().cloned().collect()))
            .collect()
    }

    /// Default tolerance entries for every known test.
    #[must_use]
    pub fn default_config(&self, default_tolerance: f64) -> ToleranceConfig {
        ToleranceConfig::with_defaults(&self.test_keys, self.unit, default_tolerance)
    }
}

/// Collect the tests that need a tolerance entry.
///
/// CSV files count only when both value and channel decode; text files
/// when the value decodes.
#[must_use]
pub fn collect_test_keys<'a>(files: impl IntoIterator<Item = &'a DataFile>) -> BTreeSet<TestKey> {
    files
        .into_iter()
        .filter_map(|file| {
            let info = parse_filename(&file.name);
            let value = info.value?;
            if file.io_type == IoType::Output && info.channel.is_none() {
                return None;
            }
            Some(TestKey::new(value, info.range, file.io_type))
        })
        .collect()
}

/// Discover files and inspect them.
///
/// # Errors
///
/// Returns an error if the input directory does not exist.
pub fn scan_workspace(config: &ScanConfig) -> anyhow::Result<WorkspaceScan> {
    if !config.input_dir.is_dir() {
        anyhow::bail!(
            "Input directory does not exist: {}",
            config.input_dir.display()
        );
    }

    let discovery = find_data_files(config);
    for err in &discovery.scan_errors {
        warn!("{}", err.format_human_readable());
    }

    let unit = detect_unit(discovery.files.iter().map(|f| f.name.as_str()));
    debug!(%unit, files = discovery.files.len(), "Detected workspace unit");

    let mut measurement_types = BTreeMap::new();
    for file in discovery.txt_files() {
        match read_file_bounded(&file.path, config.max_file_size) {
            Ok(content) => {
                let types = scan_measurement_types(&content);
                if !types.is_empty() {
                    debug!(file = %file.key, ?types, "Found measurement types");
                    measurement_types.insert(file.key.clone(), types);
                }
            }
            Err(e) => warn!(file = %file.key, "Could not scan measurement types: {e}"),
        }
    }

    let test_keys = collect_test_keys(&discovery.files);

    Ok(WorkspaceScan {
        input_dir: config.input_dir.clone(),
        unit,
        discovery,
        measurement_types,
        test_keys,
    })
}

/// Pick one measurement type per text file.
///
/// Priority: `explicit`, then `from_config`, then the alphabetically first
/// available type. Files with a single type need no selection unless one
/// is given. Requested types the file does not contain are ignored with a
/// warning.
#[must_use]
pub fn select_measurement_types(
    available: &BTreeMap<String, BTreeSet<String>>,
    explicit: &BTreeMap<String, String>,
    from_config: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut selections = BTreeMap::new();
    for (file, types) in available {
        let requested = [explicit.get(file), from_config.get(file)];
        let chosen = requested.into_iter().flatten().find(|t| {
            let ok = types.contains(*t);
            if !ok {
                warn!(%file, requested = %t, "Measurement type not present in file; ignoring");
            }
            ok
        });

        let chosen = chosen.cloned().or_else(|| {
            (types.len() > 1)
                .then(|| types.first().cloned())
                .flatten()
        });

        if let Some(t) = chosen {
            selections.insert(file.clone(), t);
        }
    }
    selections
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn data_file(name: &str) -> DataFile {
        DataFile {
            path: PathBuf::from(name),
            name: name.to_owned(),
            key: name.to_owned(),
            io_type: crate::discovery::io_type_for(std::path::Path::new(name)).unwrap(),
        }
    }

    #[test]
    fn test_collect_test_keys_rules() {
        let files = [
            data_file("PSU_5V_R10V_CH1.csv"),
            data_file("PSU_5V_R10V_CH2.csv"),
            data_file("PSU_5V_R10V.csv"),
            data_file("VT2816A_5V_R10V_1000x.txt"),
            data_file("readme.txt"),
        ];
        let keys: Vec<_> = collect_test_keys(&files).into_iter().collect();
        assert_eq!(
            keys,
            vec![
                TestKey::new(5.0, Some("10V".to_owned()), IoType::Input),
                TestKey::new(5.0, Some("10V".to_owned()), IoType::Output),
            ]
        );
    }

    fn types(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_selection_priority() {
        let mut available = BTreeMap::new();
        available.insert("a.txt".to_owned(), types(&["MeanVoltage", "Voltage"]));
        available.insert("b.txt".to_owned(), types(&["MeanVoltage", "Voltage"]));
        available.insert("c.txt".to_owned(), types(&["MeanVoltage", "Voltage"]));
        available.insert("single.txt".to_owned(), types(&["Avg"]));

        let explicit = BTreeMap::from([("a.txt".to_owned(), "Voltage".to_owned())]);
        let from_config = BTreeMap::from([
            ("a.txt".to_owned(), "MeanVoltage".to_owned()),
            ("b.txt".to_owned(), "Voltage".to_owned()),
            ("c.txt".to_owned(), "Bogus".to_owned()),
        ]);

        let selected = select_measurement_types(&available, &explicit, &from_config);
        assert_eq!(selected["a.txt"], "Voltage");
        assert_eq!(selected["b.txt"], "Voltage");
        assert_eq!(selected["c.txt"], "MeanVoltage");
        assert!(!selected.contains_key("single.txt"));
    }

    #[test]
    fn test_scan_workspace() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("VIO_3mA_R10mA.txt"),
            "|  Current_Ch01  3.001  mA\n|  MeanCurrent_Ch01  3.000  mA\n",
        )
        .unwrap();
        fs::write(tmp.path().join("PSU_3mA_CH1.csv"), "Current\n3.0\n").unwrap();

        let scan = scan_workspace(&ScanConfig::new(tmp.path())).unwrap();
        assert_eq!(scan.unit, Unit::MilliAmp);
        assert_eq!(scan.test_keys.len(), 2);
        assert_eq!(
            scan.multi_type_files()["VIO_3mA_R10mA.txt"],
            vec!["Current", "MeanCurrent"]
        );
    }

    #[test]
    fn test_scan_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let err = scan_workspace(&ScanConfig::new(tmp.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
