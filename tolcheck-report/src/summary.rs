//! Report options and run summary types.

use std::path::PathBuf;

use serde::Serialize;
use tolcheck::{IoType, ProcessOutcome, ScanError, SkippedFile, Unit};

/// Where and how to write the reports.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ReportOptions {
    /// Output directory. Defaults to the input directory.
    pub output_dir: Option<PathBuf>,
    /// Open the HTML report (or the workbook in raw mode) once written.
    pub open_after_write: bool,
}

impl ReportOptions {
    #[must_use]
    pub fn new(output_dir: Option<PathBuf>, open_after_write: bool) -> Self {
        Self {
            output_dir,
            open_after_write,
        }
    }
}

/// Files produced by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFiles {
    pub workbook: PathBuf,
    /// Absent in raw mode.
    pub html_report: Option<PathBuf>,
}

impl ReportFiles {
    /// The file a user most likely wants to look at.
    #[must_use]
    pub fn primary(&self) -> &PathBuf {
        self.html_report.as_ref().unwrap_or(&self.workbook)
    }
}

/// Pass and fail counts of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckCounts {
    pub pass: usize,
    pub fail: usize,
}

impl From<(usize, usize)> for CheckCounts {
    fn from((pass, fail): (usize, usize)) -> Self {
        Self { pass, fail }
    }
}

/// Summary of a processing run, as printed by the CLI.
///
/// `skipped` and `scan_errors` list files that contributed no rows; a run
/// with entries there still succeeded.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub unit: Unit,
    pub csv_files: usize,
    pub txt_files: usize,
    pub total_entries: usize,
    pub channels: Vec<u32>,
    pub test_values: Vec<f64>,
    pub io_types: Vec<IoType>,
    /// Absent in raw mode.
    pub mean_check: Option<CheckCounts>,
    /// Absent in raw mode.
    pub sigma_check: Option<CheckCounts>,
    pub skipped: Vec<SkippedFile>,
    pub scan_errors: Vec<ScanError>,
    pub files: ReportFiles,
}

impl RunSummary {
    #[must_use]
    pub fn new(outcome: &ProcessOutcome, files: ReportFiles) -> Self {
        let limits = outcome.limits_enabled;
        Self {
            input_dir: outcome.input_dir.clone(),
            unit: outcome.unit,
            csv_files: outcome.csv_count,
            txt_files: outcome.txt_count,
            total_entries: outcome.rows.len(),
            channels: outcome.channels().into_iter().collect(),
            test_values: outcome.test_values(),
            io_types: outcome.io_types().into_iter().collect(),
            mean_check: limits.then(|| outcome.mean_check_counts().into()),
            sigma_check: limits.then(|| outcome.sigma_check_counts().into()),
            skipped: outcome.skipped.clone(),
            scan_errors: outcome.scan_errors.clone(),
            files,
        }
    }

    /// Every row passed both checks.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        matches!(
            (self.mean_check, self.sigma_check),
            (Some(m), Some(s)) if m.fail == 0 && s.fail == 0
        )
    }
}
