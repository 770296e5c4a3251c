//! Excel workbook output.
//!
//! The workbook holds a **Test Results** sheet (one row per result) and,
//! when limits are enabled, a **Tolerance Charts** sheet with one table and
//! scatter chart per [`ChartBlock`]. Channel colours are assigned before
//! anything is written, so the file is produced in a single pass.

use std::path::Path;

use rust_xlsxwriter::{
    Chart, ChartFormat, ChartLine, ChartLineDashType, ChartMarker, ChartMarkerType,
    ChartSolidFill, ChartType, Color, ColNum, Format, RowNum, Workbook, Worksheet, XlsxError,
};
use tolcheck::{ProcessOutcome, ResultRow, Unit, Verdict, format_value};
use tracing::info;

use crate::error::ReportError;
use crate::groups::{ChartBlock, row_colors};
use crate::palette::{
    FAIL_FILL, FAIL_FONT, LIMIT_COLOR, PASS_FILL, PASS_FONT, REFERENCE_COLOR, TITLE_COLOR,
    channel_color,
};

pub const RESULTS_SHEET: &str = "Test Results";
pub const CHARTS_SHEET: &str = "Tolerance Charts";

const NUMBER_FORMAT: &str = "0.000000";
const COUNT_FORMAT: &str = "0";
const MAX_COLUMN_WIDTH: usize = 50;

/// Columns A to M take the channel colour on the results sheet.
const COLORED_COLUMNS: usize = 13;

const CHARTS_PER_ROW: usize = 2;
const BLOCK_WIDTH: usize = 26;
const BLOCK_HEIGHT: usize = 36;
const TABLE_HEADER_OFFSET: RowNum = 2;
const CHART_ROW_OFFSET: RowNum = 3;
const CHART_COL_OFFSET: ColNum = 11;
const CHART_WIDTH: u32 = 680;
const CHART_HEIGHT: u32 = 529;
const TABLE_FONT_SIZE: f64 = 9.0;

const BLOCK_HEADERS: [&str; 9] = [
    "Channel",
    "Lower Limit",
    "Reference",
    "Upper Limit",
    "Mean",
    "Mean-2\u{3c3}",
    "Mean+2\u{3c3}",
    "Mean Check",
    "Mean\u{b1}2\u{3c3} Check",
];

/// One results-sheet cell before formatting.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Integer(u32),
    Number(f64),
    Count(usize),
    Verdict(Verdict),
    Empty,
}

impl Cell {
    fn number(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }

    /// Width of the value as text, for column sizing.
    fn text_len(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            Self::Integer(n) => n.to_string().len(),
            Self::Number(v) => format_value(*v).len(),
            Self::Count(n) => n.to_string().len(),
            Self::Verdict(v) => v.as_str().len(),
            Self::Empty => 0,
        }
    }
}

fn row_num(idx: usize) -> Result<RowNum, XlsxError> {
    RowNum::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(idx: usize) -> Result<ColNum, XlsxError> {
    ColNum::try_from(idx).map_err(|_| XlsxError::RowColumnLimitError)
}

fn verdict_format(verdict: Verdict) -> Format {
    let (font, fill) = match verdict {
        Verdict::Pass => (PASS_FONT, PASS_FILL),
        Verdict::Fail => (FAIL_FONT, FAIL_FILL),
    };
    Format::new()
        .set_bold()
        .set_font_color(Color::RGB(font))
        .set_background_color(Color::RGB(fill))
}

/// Column headers of the results sheet.
#[must_use]
pub fn result_headers(unit: Unit, limits: bool) -> Vec<String> {
    let mut headers = vec![
        "Channel".to_owned(),
        "I/O Type".to_owned(),
        "Range Setting".to_owned(),
    ];
    if limits {
        headers.extend(
            [
                "Test Value",
                "Reference Value",
                "Tolerance",
                "Lower Limit",
                "Upper Limit",
                "Mean",
                "StdDev",
                "Min",
                "Max",
            ]
            .into_iter()
            .map(|h| format!("{h} [{unit}]")),
        );
        headers.extend(
            ["Samples", "Mean Check", "Mean\u{b1}2\u{3c3} Check"]
                .into_iter()
                .map(str::to_owned),
        );
    } else {
        headers.extend(
            ["Test Value", "Mean", "StdDev", "Min", "Max"]
                .into_iter()
                .map(|h| format!("{h} [{unit}]")),
        );
        headers.push("Samples".to_owned());
    }
    headers
}

fn result_cells(row: &ResultRow, limits: bool) -> Vec<Cell> {
    let mut cells = vec![
        Cell::Integer(row.channel),
        Cell::Text(row.io_type.as_str().to_owned()),
        Cell::Text(row.range_display.clone()),
        Cell::Number(row.test_value),
    ];
    if limits {
        let window = row.evaluation.as_ref().and_then(|e| e.limits.as_ref());
        cells.extend([
            Cell::number(window.map(|l| l.reference)),
            Cell::number(window.map(|l| l.tolerance)),
            Cell::number(window.map(|l| l.lower)),
            Cell::number(window.map(|l| l.upper)),
        ]);
    }
    cells.extend([
        Cell::Number(row.stats.mean),
        Cell::number(row.stats.std_dev),
        Cell::Number(row.stats.min),
        Cell::Number(row.stats.max),
        Cell::Count(row.stats.samples),
    ]);
    if limits {
        let (mean, sigma) = row
            .evaluation
            .as_ref()
            .map_or((Verdict::Fail, Verdict::Fail), |e| (e.mean_check, e.sigma_check));
        cells.extend([Cell::Verdict(mean), Cell::Verdict(sigma)]);
    }
    cells
}

/// `min(longest text + 2, 50)` per column.
fn column_widths(headers: &[String], table: &[Vec<Cell>]) -> Vec<f64> {
    (0..headers.len())
        .map(|col| {
            let longest = table
                .iter()
                .filter_map(|cells| cells.get(col))
                .map(Cell::text_len)
                .chain(std::iter::once(headers[col].chars().count()))
                .max()
                .unwrap_or(0);
            let width = (longest + 2).min(MAX_COLUMN_WIDTH);
            f64::from(u16::try_from(width).unwrap_or(u16::MAX))
        })
        .collect()
}

fn write_result_cell(
    sheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    cell: &Cell,
    color: Option<u32>,
) -> Result<(), XlsxError> {
    let base = match color {
        Some(c) => Format::new().set_font_color(Color::RGB(c)),
        None => Format::new(),
    };
    match cell {
        Cell::Text(s) => {
            sheet.write_string_with_format(row, col, s, &base)?;
        }
        Cell::Integer(n) => {
            sheet.write_number_with_format(row, col, f64::from(*n), &base)?;
        }
        Cell::Number(v) => {
            sheet.write_number_with_format(row, col, *v, &base.set_num_format(NUMBER_FORMAT))?;
        }
        Cell::Count(n) => {
            let n = u32::try_from(*n).map_or(f64::from(u32::MAX), f64::from);
            sheet.write_number_with_format(row, col, n, &base.set_num_format(COUNT_FORMAT))?;
        }
        Cell::Verdict(v) => {
            sheet.write_string_with_format(row, col, v.as_str(), &verdict_format(*v))?;
        }
        Cell::Empty => {}
    }
    Ok(())
}

fn results_sheet(outcome: &ProcessOutcome, colors: &[Option<u32>]) -> Result<Worksheet, XlsxError> {
    let limits = outcome.limits_enabled;
    let headers = result_headers(outcome.unit, limits);
    let table: Vec<Vec<Cell>> = outcome.rows.iter().map(|r| result_cells(r, limits)).collect();

    let mut sheet = Worksheet::new();
    sheet.set_name(RESULTS_SHEET)?;

    let header_format = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col_num(col)?, header, &header_format)?;
    }

    for (idx, cells) in table.iter().enumerate() {
        let row = row_num(idx + 1)?;
        let color = if limits { colors.get(idx).copied().flatten() } else { None };
        for (col, cell) in cells.iter().enumerate() {
            let color = color.filter(|_| col < COLORED_COLUMNS);
            write_result_cell(&mut sheet, row, col_num(col)?, cell, color)?;
        }
    }

    sheet.autofilter(0, 0, row_num(table.len())?, col_num(headers.len() - 1)?)?;
    for (col, width) in column_widths(&headers, &table).into_iter().enumerate() {
        sheet.set_column_width(col_num(col)?, width)?;
    }
    Ok(sheet)
}

/// Top-left cell of the `idx`-th block.
#[allow(clippy::integer_division)]
fn block_origin(idx: usize) -> Result<(RowNum, ColNum), XlsxError> {
    let row = (idx / CHARTS_PER_ROW) * BLOCK_HEIGHT;
    let col = (idx % CHARTS_PER_ROW) * BLOCK_WIDTH;
    Ok((row_num(row)?, col_num(col)?))
}

/// Values shown in one line of a block table.
struct BlockLine {
    channel: u32,
    lower: Option<f64>,
    reference: Option<f64>,
    upper: Option<f64>,
    mean: f64,
    minus_2sigma: Option<f64>,
    plus_2sigma: Option<f64>,
    mean_check: Verdict,
    sigma_check: Verdict,
}

impl BlockLine {
    fn new(row: &ResultRow) -> Self {
        let window = row.evaluation.as_ref().and_then(|e| e.limits.as_ref());
        let (mean_check, sigma_check) = row
            .evaluation
            .as_ref()
            .map_or((Verdict::Fail, Verdict::Fail), |e| (e.mean_check, e.sigma_check));
        Self {
            channel: row.channel,
            lower: window.map(|l| l.lower),
            reference: window.map(|l| l.reference),
            upper: window.map(|l| l.upper),
            mean: row.stats.mean,
            minus_2sigma: row.lower_2sigma(),
            plus_2sigma: row.upper_2sigma(),
            mean_check,
            sigma_check,
        }
    }

    fn numbers(&self) -> [Option<f64>; 6] {
        [
            self.lower,
            self.reference,
            self.upper,
            Some(self.mean),
            self.minus_2sigma,
            self.plus_2sigma,
        ]
    }
}

fn write_block_table(
    sheet: &mut Worksheet,
    origin: (RowNum, ColNum),
    title: &str,
    lines: &[BlockLine],
) -> Result<(), XlsxError> {
    let (row0, col0) = origin;

    let title_format = Format::new()
        .set_bold()
        .set_font_size(11.0)
        .set_font_color(Color::RGB(TITLE_COLOR));
    sheet.write_string_with_format(row0, col0, title, &title_format)?;

    let header_row = row0 + TABLE_HEADER_OFFSET;
    let header_format = Format::new().set_bold().set_font_size(TABLE_FONT_SIZE);
    for (offset, header) in BLOCK_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(header_row, col0 + col_num(offset)?, *header, &header_format)?;
    }

    for (position, line) in lines.iter().enumerate() {
        let row = header_row + 1 + row_num(position)?;
        let font = Format::new()
            .set_font_size(TABLE_FONT_SIZE)
            .set_font_color(Color::RGB(channel_color(position)));
        let number = font.clone().set_num_format(NUMBER_FORMAT);

        sheet.write_number_with_format(row, col0, f64::from(line.channel), &font)?;
        for (offset, value) in line.numbers().into_iter().enumerate() {
            if let Some(v) = value {
                sheet.write_number_with_format(row, col0 + 1 + col_num(offset)?, v, &number)?;
            }
        }
        for (offset, verdict) in [line.mean_check, line.sigma_check].into_iter().enumerate() {
            let format = verdict_format(verdict).set_font_size(TABLE_FONT_SIZE);
            sheet.write_string_with_format(row, col0 + 7 + col_num(offset)?, verdict.as_str(), &format)?;
        }
    }
    Ok(())
}

/// Y-axis bounds: the value span padded by 20 %.
fn y_bounds(lines: &[BlockLine]) -> (f64, f64) {
    let values: Vec<f64> = lines
        .iter()
        .flat_map(|l| l.numbers().into_iter().flatten())
        .collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min {
        max - min
    } else {
        let fallback = max.abs() * 0.1;
        if fallback > 0.0 { fallback } else { 0.1 }
    };
    let padding = span * 0.2;
    (min - padding, max + padding)
}

/// X-axis bounds: channel range padded by `max(0.8, 10 % of span)`.
fn x_bounds(lines: &[BlockLine]) -> (f64, f64) {
    let min = lines.iter().map(|l| l.channel).min().map_or(0.0, f64::from);
    let max = lines.iter().map(|l| l.channel).max().map_or(0.0, f64::from);
    let padding = ((max - min) * 0.1).max(0.8);
    (min - padding, max + padding)
}

fn block_chart(
    title: &str,
    unit: Unit,
    origin: (RowNum, ColNum),
    lines: &[BlockLine],
) -> Result<Chart, XlsxError> {
    let (row0, col0) = origin;
    let first = row0 + TABLE_HEADER_OFFSET + 1;
    let last = first + row_num(lines.len().saturating_sub(1))?;
    let range = |row_a: RowNum, row_b: RowNum, offset: ColNum| {
        (CHARTS_SHEET, row_a, col0 + offset, row_b, col0 + offset)
    };

    let mut chart = Chart::new(ChartType::ScatterStraight);
    chart.title().set_name(title);
    chart.set_style(10);
    chart.set_width(CHART_WIDTH).set_height(CHART_HEIGHT);
    chart.legend().set_hidden();

    let (x_min, x_max) = x_bounds(lines);
    chart
        .x_axis()
        .set_name("Channel")
        .set_min(x_min)
        .set_max(x_max)
        .set_major_unit(1.0)
        .set_major_gridlines(false);
    let (y_min, y_max) = y_bounds(lines);
    let y_title = format!("Measurement [{unit}]");
    chart
        .y_axis()
        .set_name(y_title.as_str())
        .set_min(y_min)
        .set_max(y_max)
        .set_major_gridlines(false);

    for (name, offset, color, dashed) in [
        ("Lower Limit", 1, LIMIT_COLOR, true),
        ("Reference", 2, REFERENCE_COLOR, false),
        ("Upper Limit", 3, LIMIT_COLOR, true),
    ] {
        let mut line = ChartLine::new();
        line.set_color(Color::RGB(color)).set_width(1.0);
        if dashed {
            line.set_dash_type(ChartLineDashType::Dash);
        }
        chart
            .add_series()
            .set_name(name)
            .set_categories(range(first, last, 0))
            .set_values(range(first, last, offset))
            .set_marker(ChartMarker::new().set_none())
            .set_format(ChartFormat::new().set_line(&line));
    }

    for (position, line) in lines.iter().enumerate() {
        let row = first + row_num(position)?;
        let color = Color::RGB(channel_color(position));
        let mut fill = ChartFormat::new();
        fill.set_solid_fill(ChartSolidFill::new().set_color(color))
            .set_line(ChartLine::new().set_color(color));
        for (suffix, offset, marker, size) in [
            ("Mean", 4, ChartMarkerType::Diamond, 6),
            ("-2\u{3c3}", 5, ChartMarkerType::LongDash, 8),
            ("+2\u{3c3}", 6, ChartMarkerType::LongDash, 8),
        ] {
            let name = format!("CH{} {suffix}", line.channel);
            chart
                .add_series()
                .set_name(name.as_str())
                .set_categories(range(row, row, 0))
                .set_values(range(row, row, offset))
                .set_marker(ChartMarker::new().set_type(marker).set_size(size).set_format(&mut fill))
                .set_format(ChartFormat::new().set_no_line());
        }
    }

    Ok(chart)
}

fn charts_sheet(outcome: &ProcessOutcome, blocks: &[ChartBlock]) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(CHARTS_SHEET)?;

    for (idx, block) in blocks.iter().enumerate() {
        let origin = block_origin(idx)?;
        let title = block.title(outcome.unit);
        let lines: Vec<BlockLine> = block
            .rows
            .iter()
            .map(|&i| BlockLine::new(&outcome.rows[i]))
            .collect();
        if lines.is_empty() {
            continue;
        }

        write_block_table(&mut sheet, origin, &title, &lines)?;
        let chart = block_chart(&title, outcome.unit, origin, &lines)?;
        sheet.insert_chart(origin.0 + CHART_ROW_OFFSET, origin.1 + CHART_COL_OFFSET, &chart)?;
        info!(chart = %title, "Created tolerance chart");
    }
    Ok(sheet)
}

/// Write the workbook for `outcome` to `path`.
///
/// `blocks` must come from [`crate::groups::chart_blocks`] over the same
/// rows; the charts sheet is only written when limits are enabled.
///
/// # Errors
///
/// Returns [`ReportError::NoRows`] for an empty outcome and
/// [`ReportError::Xlsx`] when the workbook cannot be built or saved.
pub fn write_workbook(
    outcome: &ProcessOutcome,
    blocks: &[ChartBlock],
    path: &Path,
) -> Result<(), ReportError> {
    if outcome.rows.is_empty() {
        return Err(ReportError::NoRows);
    }

    let colors = row_colors(blocks, outcome.rows.len());
    let mut workbook = Workbook::new();
    workbook.push_worksheet(results_sheet(outcome, &colors)?);
    if outcome.limits_enabled {
        workbook.push_worksheet(charts_sheet(outcome, blocks)?);
    }
    workbook.save(path)?;

    info!(path = %path.display(), rows = outcome.rows.len(), "Saved workbook");
    Ok(())
}
