//! The processing pipeline: discover, parse, compute statistics, evaluate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use tolcheck_naming::{Unit, detect_unit, parse_filename};
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::discovery::{DataFile, find_data_files};
use crate::error::{ScanError, SkipReason, SkippedFile};
use crate::ingest::{parse_csv, parse_text, read_file_bounded};
use crate::model::{Evaluation, IoType, ResultRow};
use crate::stats::MeasurementStats;
use crate::tolerance::{ResolvedConfig, apply_limits};

/// What to do with the discovered files.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ProcessOptions {
    /// Tolerance configuration. `None` produces statistics only (raw mode).
    pub limits: Option<ResolvedConfig>,
    /// Measurement type per text file, keyed by path relative to the input
    /// directory.
    pub measurement_types: BTreeMap<String, String>,
    /// Unit override; detected from the file names when absent.
    pub unit: Option<Unit>,
}

impl ProcessOptions {
    #[must_use]
    pub fn raw() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: ResolvedConfig) -> Self {
        Self {
            limits: Some(limits),
            ..Self::default()
        }
    }
}

/// Result of a processing run.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct ProcessOutcome {
    pub input_dir: PathBuf,
    pub unit: Unit,
    /// Sorted by channel, I/O type, range, test value.
    pub rows: Vec<ResultRow>,
    pub skipped: Vec<SkippedFile>,
    pub scan_errors: Vec<ScanError>,
    pub csv_count: usize,
    pub txt_count: usize,
    /// Earliest modification time of the data files.
    pub data_timestamp: Option<DateTime<Local>>,
    pub limits_enabled: bool,
}

impl ProcessOutcome {
    /// Outcome over `rows` with no skipped files, scan errors or file counts.
    #[must_use]
    pub fn new(input_dir: PathBuf, unit: Unit, rows: Vec<ResultRow>, limits_enabled: bool) -> Self {
        Self {
            input_dir,
            unit,
            rows,
            skipped: Vec::new(),
            scan_errors: Vec::new(),
            csv_count: 0,
            txt_count: 0,
            data_timestamp: None,
            limits_enabled,
        }
    }

    #[must_use]
    pub fn channels(&self) -> BTreeSet<u32> {
        self.rows.iter().map(|r| r.channel).collect()
    }

    #[must_use]
    pub fn io_types(&self) -> BTreeSet<IoType> {
        self.rows.iter().map(|r| r.io_type).collect()
    }

    /// Distinct test values in ascending order.
    #[must_use]
    pub fn test_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self.rows.iter().map(|r| r.test_value).collect();
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.to_bits() == b.to_bits());
        values
    }

    /// Distinct displayed range settings in ascending order.
    #[must_use]
    pub fn ranges(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.range_display.as_str()).collect()
    }

    /// Number of rows whose mean check passed and failed.
    #[must_use]
    pub fn mean_check_counts(&self) -> (usize, usize) {
        self.count_checks(|e| e.mean_check.is_pass())
    }

    /// Number of rows whose mean±2σ check passed and failed.
    #[must_use]
    pub fn sigma_check_counts(&self) -> (usize, usize) {
        self.count_checks(|e| e.sigma_check.is_pass())
    }

    fn count_checks(&self, pass: impl Fn(&Evaluation) -> bool) -> (usize, usize) {
        self.rows
            .iter()
            .filter_map(|r| r.evaluation.as_ref())
            .fold((0, 0), |(p, f), e| if pass(e) { (p + 1, f) } else { (p, f + 1) })
    }
}

fn process_csv(file: &DataFile, max_file_size: u64) -> Result<ResultRow, SkippedFile> {
    let skip = |reason, message: String| SkippedFile::new(file.path.clone(), reason, message);

    let info = parse_filename(&file.name);
    let (value, channel) = match (info.value, info.channel) {
        (Some(value), Some(channel)) => (value, channel),
        (None, _) => {
            return Err(skip(
                SkipReason::UndecodableName,
                "could not parse test value from filename".to_owned(),
            ));
        }
        (Some(_), None) => {
            return Err(skip(
                SkipReason::MissingChannel,
                "could not parse channel from filename".to_owned(),
            ));
        }
    };

    let content = read_file_bounded(&file.path, max_file_size)
        .map_err(|e| skip(e.skip_reason(), e.to_string()))?;
    let parsed = parse_csv(&content).map_err(|e| skip(e.skip_reason(), e.to_string()))?;
    let stats = MeasurementStats::from_values(&parsed.values)
        .ok_or_else(|| skip(SkipReason::NoMeasurements, "No valid measurements".to_owned()))?;

    info!(
        file = %file.name,
        channel,
        value,
        range = info.range.as_deref().unwrap_or("N/A"),
        samples = stats.samples,
        "Processed output file"
    );
    Ok(ResultRow::new(channel, IoType::Output, info.range, value, stats))
}

fn process_txt(
    file: &DataFile,
    selected_type: Option<&str>,
    max_file_size: u64,
) -> Result<Vec<ResultRow>, SkippedFile> {
    let skip = |reason, message: String| SkippedFile::new(file.path.clone(), reason, message);

    let info = parse_filename(&file.name);
    let Some(value) = info.value else {
        return Err(skip(
            SkipReason::UndecodableName,
            "could not parse test value from filename".to_owned(),
        ));
    };

    let content = read_file_bounded(&file.path, max_file_size)
        .map_err(|e| skip(e.skip_reason(), e.to_string()))?;
    let channel_data = parse_text(&content, selected_type, info.channel);

    let rows: Vec<ResultRow> = channel_data
        .into_iter()
        .filter_map(|(channel, values)| {
            let stats = MeasurementStats::from_values(&values)?;
            info!(
                file = %file.name,
                channel,
                value,
                range = info.range.as_deref().unwrap_or("N/A"),
                samples = stats.samples,
                measurement_type = selected_type.unwrap_or(""),
                "Processed input channel"
            );
            Some(ResultRow::new(channel, IoType::Input, info.range.clone(), value, stats))
        })
        .collect();

    if rows.is_empty() {
        return Err(skip(
            SkipReason::NoMeasurements,
            "No valid measurements parsed".to_owned(),
        ));
    }
    Ok(rows)
}

/// Run the pipeline over `scan.input_dir`.
///
/// Per-file failures are collected in [`ProcessOutcome::skipped`] and never
/// abort the run.
///
/// # Errors
///
/// Returns an error if the input directory does not exist, holds no CSV or
/// TXT files, or yields no result rows.
pub fn process(scan: &ScanConfig, options: &ProcessOptions) -> anyhow::Result<ProcessOutcome> {
    if !scan.input_dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", scan.input_dir.display());
    }

    let discovery = find_data_files(scan);
    for err in &discovery.scan_errors {
        warn!("{}", err.format_human_readable());
    }
    if discovery.files.is_empty() {
        anyhow::bail!("No CSV or TXT files found in {}", scan.input_dir.display());
    }

    let csv_count = discovery.csv_count();
    let txt_count = discovery.txt_count();
    info!(csv_count, txt_count, "Found data files");

    let unit = options
        .unit
        .unwrap_or_else(|| detect_unit(discovery.files.iter().map(|f| f.name.as_str())));

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for file in discovery.csv_files() {
        match process_csv(file, scan.max_file_size) {
            Ok(row) => rows.push(row),
            Err(s) => skipped.push(s),
        }
    }
    for file in discovery.txt_files() {
        let selected = options.measurement_types.get(&file.key).map(String::as_str);
        match process_txt(file, selected, scan.max_file_size) {
            Ok(file_rows) => rows.extend(file_rows),
            Err(s) => skipped.push(s),
        }
    }

    for s in &skipped {
        warn!("Skipping {}", s.format_human_readable());
    }

    if rows.is_empty() {
        anyhow::bail!("No valid results to save");
    }

    rows.sort_by(ResultRow::report_order);

    if let Some(limits) = &options.limits {
        apply_limits(&mut rows, limits);
    }

    Ok(ProcessOutcome {
        skipped,
        scan_errors: discovery.scan_errors.clone(),
        csv_count,
        txt_count,
        data_timestamp: discovery.earliest_modified(),
        ..ProcessOutcome::new(scan.input_dir.clone(), unit, rows, options.limits.is_some())
    })
}
