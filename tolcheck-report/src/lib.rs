//! # tolcheck-report
//!
//! Excel workbook and interactive HTML report writers for
//! [`tolcheck::ProcessOutcome`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tolcheck::{DEFAULT_TOLERANCE, ProcessOptions, ScanConfig, process, scan_workspace};
//! use tolcheck_report::{ReportOptions, RunSummary, output, write_reports};
//!
//! let scan = ScanConfig::new("measurements/bench_01");
//! let limits = scan_workspace(&scan)
//!     .unwrap()
//!     .default_config(DEFAULT_TOLERANCE)
//!     .resolve()
//!     .unwrap();
//! let outcome = process(&scan, &ProcessOptions::with_limits(limits)).unwrap();
//!
//! let files = write_reports(&outcome, &ReportOptions::default()).unwrap();
//! output::write_human(&RunSummary::new(&outcome, files), &mut std::io::stdout()).unwrap();
//! ```

mod error;
pub mod excel;
pub mod groups;
pub mod html;
pub mod output;
pub mod palette;
mod summary;

pub use error::ReportError;
pub use excel::write_workbook;
pub use groups::{ChartBlock, chart_blocks, row_colors};
pub use html::write_html_report;
pub use summary::{CheckCounts, ReportFiles, ReportOptions, RunSummary};

use anyhow::Context;
use tolcheck::ProcessOutcome;
use tolcheck::versioning::{report_path_for, workbook_path};

/// Write the workbook and, when limits are enabled, the HTML report.
///
/// The workbook is named after the input directory and never overwrites an
/// existing file; the report sits next to it.
///
/// # Errors
///
/// Returns an error if the output directory cannot be created or either
/// file cannot be written.
pub fn write_reports(
    outcome: &ProcessOutcome,
    options: &ReportOptions,
) -> anyhow::Result<ReportFiles> {
    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| outcome.input_dir.clone());
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    let workbook = workbook_path(&output_dir, &outcome.input_dir);
    let blocks = chart_blocks(&outcome.rows);
    write_workbook(outcome, &blocks, &workbook)
        .with_context(|| format!("Failed to write workbook {}", workbook.display()))?;

    let html_report = if outcome.limits_enabled {
        let path = report_path_for(&workbook);
        let stem = workbook
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_html_report(outcome, &blocks, &stem, &path)
            .with_context(|| format!("Failed to write HTML report {}", path.display()))?;
        Some(path)
    } else {
        None
    };

    Ok(ReportFiles {
        workbook,
        html_report,
    })
}
