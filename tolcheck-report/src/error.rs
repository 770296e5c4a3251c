use std::path::PathBuf;

use thiserror::Error;

/// Errors from writing a workbook or HTML report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Nothing to report: no result rows")]
    NoRows,

    #[error("HTML report needs tolerance limits; run with limits enabled")]
    LimitsRequired,
}
