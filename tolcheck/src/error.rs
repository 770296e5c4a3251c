//! Error types for measurement ingest and tolerance configuration.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tolcheck_naming::Unit;

use crate::model::IoType;

/// The kind of discovery failure that kept a path out of the run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanErrorKind {
    /// A directory traversal error (permission denied, loop detected, etc.).
    WalkError,
    /// An exclude glob pattern could not be parsed.
    InvalidExcludePattern,
}

/// A discovery-level error: a path that could not be enumerated at all.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct ScanError {
    /// The path that could not be scanned.
    pub file: PathBuf,
    /// The kind of failure.
    pub kind: ScanErrorKind,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ScanError {
    /// Format the error for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        format!("{}: [scan error] {}", self.file.display(), self.message)
    }
}

/// Failure reading or decoding one measurement file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File exceeds maximum size of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No numeric columns found")]
    NoNumericColumn,

    #[error("Column '{column}' holds non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    #[error("No valid measurements")]
    NoMeasurements,
}

impl IngestError {
    /// Classify this error for the run summary.
    #[must_use]
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Self::Io { .. } | Self::FileTooLarge { .. } => SkipReason::Unreadable,
            Self::Csv(_) | Self::NoNumericColumn | Self::NonNumeric { .. } => {
                SkipReason::NoNumericColumn
            }
            Self::NoMeasurements => SkipReason::NoMeasurements,
        }
    }
}

/// Why a data file contributed no result rows.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub enum SkipReason {
    /// No test value could be decoded from the file name.
    UndecodableName,
    /// A CSV file name carries no `_CH<n>` token.
    MissingChannel,
    /// The file could not be read.
    Unreadable,
    /// No usable measurement column was found.
    NoNumericColumn,
    /// The file parsed but held no values.
    NoMeasurements,
}

/// A data file that was skipped, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[non_exhaustive]
pub struct SkippedFile {
    pub file: PathBuf,
    pub reason: SkipReason,
    pub message: String,
}

impl SkippedFile {
    #[must_use]
    pub fn new(file: PathBuf, reason: SkipReason, message: impl Into<String>) -> Self {
        Self {
            file,
            reason,
            message: message.into(),
        }
    }

    /// Format the entry for human-readable output.
    #[must_use]
    pub fn format_human_readable(&self) -> String {
        let name = self
            .file
            .file_name()
            .map_or_else(|| self.file.display().to_string(), |n| n.to_string_lossy().into_owned());
        format!("{name}: {}", self.message)
    }
}

/// Errors from loading, saving or resolving a tolerance configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field} value '{value}' for test value {test_value}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        test_value: f64,
    },

    #[error("Tolerance must be non-negative for {test_value} {unit} ({io_type}), got {tolerance}")]
    NegativeTolerance {
        test_value: f64,
        unit: Unit,
        io_type: IoType,
        tolerance: f64,
    },

    #[error("Invalid I/O type '{0}', expected 'Input' or 'Output'")]
    InvalidIoType(String),
}
