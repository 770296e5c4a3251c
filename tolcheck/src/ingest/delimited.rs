//! CSV exports from output devices.

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::IngestError;

/// Header fragments that mark the measurement column (matched against the
/// trimmed, lowercased header).
pub const MEASUREMENT_KEYWORDS: &[&str] = &[
    "voltage",
    "vdc",
    "resistance",
    "ohm",
    "current",
    "adc",
    "measurement",
];

/// Cell spellings treated as a missing value.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "n/a", "NaN", "nan", "-nan", "null", "NULL", "None"];

/// The measurement column picked from a CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvMeasurements {
    pub column: String,
    pub values: Vec<f64>,
}

fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|c| !MISSING_MARKERS.contains(c))
}

fn is_numeric_column(records: &[StringRecord], idx: usize) -> bool {
    records
        .iter()
        .filter_map(|r| cell(r, idx))
        .all(|c| c.parse::<f64>().is_ok())
}

/// Pick the measurement column and return its non-missing values.
///
/// The first header containing one of [`MEASUREMENT_KEYWORDS`] wins;
/// otherwise the last column whose cells are all numeric is used.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] for malformed input,
/// [`IngestError::NoNumericColumn`] when no column qualifies,
/// [`IngestError::NonNumeric`] when the keyword column holds text and
/// [`IngestError::NoMeasurements`] when the column is empty.
pub fn parse_csv(content: &str) -> Result<CsvMeasurements, IngestError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    let keyword_column = headers.iter().position(|h| {
        let lowered = h.trim().to_lowercase();
        MEASUREMENT_KEYWORDS.iter().any(|k| lowered.contains(k))
    });

    let idx = keyword_column
        .or_else(|| {
            (0..headers.len())
                .rev()
                .find(|&idx| is_numeric_column(&records, idx))
        })
        .ok_or(IngestError::NoNumericColumn)?;
    let column = headers.get(idx).unwrap_or_default().trim().to_owned();

    let mut values = Vec::with_capacity(records.len());
    for raw in records.iter().filter_map(|r| cell(r, idx)) {
        let value = raw.parse::<f64>().map_err(|_| IngestError::NonNumeric {
            column: column.clone(),
            value: raw.to_owned(),
        })?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(IngestError::NoMeasurements);
    }

    debug!(%column, samples = values.len(), "Selected CSV measurement column");
    Ok(CsvMeasurements { column, values })
}
