//! Run summary formatting.
//!
//! JSON and plain-text writers for [`RunSummary`]. Colours are left to the
//! CLI.

use std::io::Write;

use tolcheck::format_value;

use crate::summary::RunSummary;

/// Write a `RunSummary` as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json(summary: &RunSummary, writer: &mut dyn Write) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    writeln!(writer, "{json}")?;
    Ok(())
}

fn join<T>(items: &[T], fmt: impl Fn(&T) -> String) -> String {
    items.iter().map(fmt).collect::<Vec<_>>().join(", ")
}

/// Write a `RunSummary` as human-readable plain text.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human(summary: &RunSummary, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(70))?;
    writeln!(writer, "  MEASUREMENT REPORT")?;
    writeln!(writer, "{}", "=".repeat(70))?;
    writeln!(writer)?;
    writeln!(writer, "  Input:          {}", summary.input_dir.display())?;
    writeln!(writer, "  Unit:           {}", summary.unit)?;
    writeln!(
        writer,
        "  Files:          {} CSV (Output), {} TXT (Input)",
        summary.csv_files, summary.txt_files
    )?;
    writeln!(writer, "  Total entries:  {}", summary.total_entries)?;
    writeln!(writer, "  Channels:       {}", join(&summary.channels, ToString::to_string))?;
    writeln!(writer, "  Test values:    {}", join(&summary.test_values, |v| format_value(*v)))?;
    writeln!(writer, "  I/O types:      {}", join(&summary.io_types, ToString::to_string))?;
    if let (Some(mean), Some(sigma)) = (summary.mean_check, summary.sigma_check) {
        writeln!(writer, "  Mean check:     {} pass, {} fail", mean.pass, mean.fail)?;
        writeln!(writer, "  \u{b1}2\u{3c3} check:     {} pass, {} fail", sigma.pass, sigma.fail)?;
    }
    writeln!(writer)?;

    if !summary.scan_errors.is_empty() {
        writeln!(writer, "{}", "-".repeat(70))?;
        writeln!(writer, "  SCAN ERRORS")?;
        writeln!(writer, "{}", "-".repeat(70))?;
        for err in &summary.scan_errors {
            writeln!(writer, "{}", err.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    if !summary.skipped.is_empty() {
        writeln!(writer, "{}", "-".repeat(70))?;
        writeln!(writer, "  SKIPPED FILES")?;
        writeln!(writer, "{}", "-".repeat(70))?;
        for skipped in &summary.skipped {
            writeln!(writer, "{}", skipped.format_human_readable())?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "{}", "=".repeat(70))?;
    writeln!(writer, "\u{2713} Results saved to {}", summary.files.workbook.display())?;
    if let Some(html) = &summary.files.html_report {
        writeln!(writer, "\u{2713} Interactive HTML report saved to {}", html.display())?;
    }
    writeln!(writer, "{}", "=".repeat(70))?;

    Ok(())
}
