//! # tolcheck
//!
//! Measurement ingest and tolerance evaluation for bench test exports.
//!
//! Test equipment writes one file per test point: CSV tables for output
//! devices and text logs for input devices, with the test value, range and
//! channel encoded in the file name. This crate turns a directory of such
//! files into sorted result rows with statistics and PASS/FAIL checks.
//! Rendering the rows is left to `tolcheck-report`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tolcheck::{DEFAULT_TOLERANCE, ProcessOptions, ScanConfig, process, scan_workspace};
//!
//! let scan = ScanConfig::new("measurements/bench_01");
//! let workspace = scan_workspace(&scan).unwrap();
//! let limits = workspace.default_config(DEFAULT_TOLERANCE).resolve().unwrap();
//!
//! let outcome = process(&scan, &ProcessOptions::with_limits(limits)).unwrap();
//! println!("Rows: {}", outcome.rows.len());
//! println!("Skipped files: {}", outcome.skipped.len());
//! ```

pub mod config;
pub mod discovery;
mod error;
pub mod ingest;
mod model;
mod pipeline;
mod stats;
pub mod tolerance;
pub mod versioning;
mod workspace;


pub use config::{
    CONFIG_FILE_NAME, ConfigEntry, ConfigFile, DEFAULT_TOLERANCE, EntryInput, MergeSummary,
    NumberOrString, ScanConfig, ToleranceConfig,
};
pub use discovery::{DataFile, Discovery, find_data_files};
pub use error::{ConfigError, IngestError, ScanError, ScanErrorKind, SkipReason, SkippedFile};
pub use model::{
    Evaluation, IoType, Limits, NO_RANGE, ResultRow, TestKey, Verdict, format_value,
};
pub use pipeline::{ProcessOptions, ProcessOutcome, process};
pub use stats::MeasurementStats;
pub use tolerance::{ResolvedConfig, TestConfig};
pub use workspace::{WorkspaceScan, collect_test_keys, scan_workspace, select_measurement_types};

pub use tolcheck_naming::{FileNameInfo, Unit, parse_filename};
