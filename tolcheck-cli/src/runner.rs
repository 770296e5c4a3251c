//! One processing run as driven by the CLI and the web front end.

use std::collections::BTreeMap;

use tolcheck::{
    ConfigFile, DEFAULT_TOLERANCE, ProcessOptions, ScanConfig, process, scan_workspace,
    select_measurement_types,
};
use tolcheck_report::{ReportOptions, RunSummary, write_reports};
use tracing::info;

/// Everything a run needs besides the files themselves.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Tolerance for tests the saved configuration does not cover.
    pub tolerance: f64,
    /// Saved configuration applied on top of the defaults.
    pub config: Option<ConfigFile>,
    /// Measurement type per text file name; wins over `config`.
    pub measurement_types: BTreeMap<String, String>,
    /// Statistics only, no limits and no HTML report.
    pub raw: bool,
    pub report: ReportOptions,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            config: None,
            measurement_types: BTreeMap::new(),
            raw: false,
            report: ReportOptions::default(),
        }
    }
}

/// Scan, configure, process and write the reports.
///
/// # Errors
///
/// Returns an error if the input directory is unusable, a configured
/// reference or tolerance is invalid, no rows are produced, or a report
/// cannot be written.
pub fn run(scan: &ScanConfig, request: &RunRequest) -> anyhow::Result<RunSummary> {
    let workspace = scan_workspace(scan)?;

    let mut options = if request.raw {
        ProcessOptions::raw()
    } else {
        let mut tolerance = workspace.default_config(request.tolerance);
        if let Some(file) = &request.config {
            let merged = tolerance.merge_file(file);
            info!(
                applied = merged.applied,
                known = tolerance.entries.len(),
                "Applied saved configuration"
            );
        }
        ProcessOptions::with_limits(tolerance.resolve()?)
    };

    let from_config = request
        .config
        .as_ref()
        .map_or_else(BTreeMap::new, |c| c.measurement_types.clone());
    options.measurement_types = select_measurement_types(
        &workspace.measurement_types,
        &request.measurement_types,
        &from_config,
    );
    options.unit = Some(workspace.unit);

    let outcome = process(scan, &options)?;
    let files = write_reports(&outcome, &request.report)?;
    Ok(RunSummary::new(&outcome, files))
}
