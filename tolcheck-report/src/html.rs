//! Interactive HTML report.
//!
//! A single self-contained page: Plotly is loaded from the CDN, every chart
//! is inlined, and the table filters run client side.

use std::path::Path;

use chrono::{DateTime, Local};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use plotly::common::{DashType, HoverInfo, Line, Marker, MarkerSymbol, Mode, TickMode, Title};
use plotly::layout::{Axis, HoverMode, Margin};
use plotly::{Configuration, Layout, Plot, Scatter};
use tolcheck::{IoType, ProcessOutcome, ResultRow, Unit, Verdict, format_value};
use tracing::info;

use crate::error::ReportError;
use crate::groups::ChartBlock;
use crate::palette::{LIMIT_COLOR, REFERENCE_COLOR, channel_color, css_hex};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-latest.min.js";
const STYLE: &str = include_str!("../assets/report.css");
const SCRIPT: &str = include_str!("../assets/report.js");
const GRID_COLOR: &str = "#E0E0E0";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Everything the page shows besides the rows themselves.
#[derive(Debug, Clone)]
pub struct HtmlReport<'a> {
    pub outcome: &'a ProcessOutcome,
    pub blocks: &'a [ChartBlock],
    /// Workbook stem the report belongs to.
    pub source_name: &'a str,
    pub generated_at: DateTime<Local>,
}

fn limit_trace(
    name: &str,
    value: f64,
    x_range: [f64; 2],
    color: u32,
    dashed: bool,
) -> Box<Scatter<f64, f64>> {
    let mut line = Line::new().color(css_hex(color)).width(2.0);
    if dashed {
        line = line.dash(DashType::Dash);
    }
    let label = format!("{name} ({value:.6})");
    Scatter::new(x_range.to_vec(), vec![value, value])
        .mode(Mode::Lines)
        .name(label.as_str())
        .line(line)
        .hover_template(format!("{label}<br>%{{y:.6f}}<extra></extra>").as_str())
}

fn channel_traces(plot: &mut Plot, row: &ResultRow, position: usize) {
    let color = css_hex(channel_color(position));
    let x = f64::from(row.channel);
    let ch = row.channel;
    let (mean_check, sigma_check) = row
        .evaluation
        .as_ref()
        .map_or((Verdict::Fail, Verdict::Fail), |e| (e.mean_check, e.sigma_check));

    plot.add_trace(
        Scatter::new(vec![x], vec![row.stats.mean])
            .mode(Mode::Markers)
            .name(format!("CH{ch} Mean").as_str())
            .marker(
                Marker::new()
                    .symbol(MarkerSymbol::Diamond)
                    .size(12)
                    .color(color.clone())
                    .line(Line::new().color(color.clone()).width(1.0)),
            )
            .hover_template(
                format!("CH{ch}<br>Mean: %{{y:.6f}}<br>Check: {mean_check}<extra></extra>").as_str(),
            ),
    );

    let (Some(lower), Some(upper)) = (row.lower_2sigma(), row.upper_2sigma()) else {
        return;
    };
    let sigma_marker = || {
        Marker::new()
            .symbol(MarkerSymbol::LineEW)
            .size(10)
            .color(color.clone())
            .line(Line::new().color(color.clone()).width(3.0))
    };
    plot.add_trace(
        Scatter::new(vec![x], vec![lower])
            .mode(Mode::Markers)
            .name(format!("CH{ch} -2\u{3c3}").as_str())
            .marker(sigma_marker())
            .hover_template(format!("CH{ch}<br>Mean-2\u{3c3}: %{{y:.6f}}<extra></extra>").as_str())
            .show_legend(false),
    );
    plot.add_trace(
        Scatter::new(vec![x], vec![upper])
            .mode(Mode::Markers)
            .name(format!("CH{ch} +2\u{3c3}").as_str())
            .marker(sigma_marker())
            .hover_template(
                format!(
                    "CH{ch}<br>Mean+2\u{3c3}: %{{y:.6f}}<br>\u{b1}2\u{3c3} Check: {sigma_check}<extra></extra>"
                )
                .as_str(),
            )
            .show_legend(false),
    );
    plot.add_trace(
        Scatter::new(vec![x, x], vec![lower, upper])
            .mode(Mode::Lines)
            .line(Line::new().color(color).width(1.0))
            .show_legend(false)
            .hover_info(HoverInfo::Skip),
    );
}

fn block_layout(channels: &[u32], unit: Unit) -> Layout {
    let tick0 = channels.iter().min().map_or(0.0, |&c| f64::from(c));
    Layout::new()
        .x_axis(
            Axis::new()
                .title(Title::new("Channel"))
                .tick_mode(TickMode::Linear)
                .tick0(tick0)
                .dtick(1.0)
                .auto_range(true)
                .show_grid(true)
                .grid_width(1)
                .grid_color(GRID_COLOR),
        )
        .y_axis(
            Axis::new()
                .title(Title::new(format!("Measurement [{unit}]").as_str()))
                .auto_range(true)
                .show_grid(true)
                .grid_width(1)
                .grid_color(GRID_COLOR),
        )
        .show_legend(false)
        .hover_mode(HoverMode::Closest)
        .plot_background_color("white")
        .paper_background_color("white")
        .margin(Margin::new().left(60).right(20).top(30).bottom(50))
        .auto_size(true)
}

/// Plotly figure for one block.
#[must_use]
pub fn block_plot(block: &ChartBlock, rows: &[ResultRow], unit: Unit) -> Plot {
    let channels = block.channels(rows);
    let mut plot = Plot::new();

    if let Some(limits) = block.limits(rows) {
        let lo = channels.iter().min().map_or(0.0, |&c| f64::from(c)) - 0.5;
        let hi = channels.iter().max().map_or(0.0, |&c| f64::from(c)) + 0.5;
        let x_range = [lo, hi];
        plot.add_trace(limit_trace("Lower Limit", limits.lower, x_range, LIMIT_COLOR, true));
        plot.add_trace(limit_trace("Reference", limits.reference, x_range, REFERENCE_COLOR, false));
        plot.add_trace(limit_trace("Upper Limit", limits.upper, x_range, LIMIT_COLOR, true));
    }

    for (position, &idx) in block.rows.iter().enumerate() {
        channel_traces(&mut plot, &rows[idx], position);
    }

    plot.set_layout(block_layout(&channels, unit));
    plot.set_configuration(Configuration::new().responsive(true));
    plot
}

fn io_class(io_type: IoType) -> &'static str {
    match io_type {
        IoType::Input => "input",
        IoType::Output => "output",
    }
}

fn verdict_class(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Pass => "pass",
        Verdict::Fail => "fail",
    }
}

fn fixed(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

impl HtmlReport<'_> {
    fn header(&self) -> Markup {
        let outcome = self.outcome;
        let recorded = outcome
            .data_timestamp
            .map_or_else(|| "unknown".to_owned(), |t| t.format(TIMESTAMP_FORMAT).to_string());
        html! {
            div class="header" {
                h1 { "\u{1f4ca} Measurement Analysis Report" }
                p {
                    "Generated from: " (self.source_name)
                    " | Unit: " (outcome.unit.symbol())
                    " | Total Measurements: " (outcome.rows.len())
                }
                p {
                    "Data recorded: " (recorded)
                    " | Report generated: " (self.generated_at.format(TIMESTAMP_FORMAT).to_string())
                }
            }
        }
    }

    fn summary_cards(&self) -> Markup {
        let (mean_pass, mean_fail) = self.outcome.mean_check_counts();
        let (sigma_pass, sigma_fail) = self.outcome.sigma_check_counts();
        let cards = [
            ("neutral", "Total Tests".to_owned(), self.outcome.rows.len()),
            ("pass", "Mean Check Pass".to_owned(), mean_pass),
            ("fail", "Mean Check Fail".to_owned(), mean_fail),
            ("pass", "\u{b1}2\u{3c3} Check Pass".to_owned(), sigma_pass),
            ("fail", "\u{b1}2\u{3c3} Check Fail".to_owned(), sigma_fail),
        ];
        html! {
            div class="summary-cards" {
                @for (class, label, value) in &cards {
                    div class={ "card " (class) } {
                        h3 { (label) }
                        div class="value" { (value) }
                    }
                }
            }
        }
    }

    fn section_header(id: &str, title: &str) -> Markup {
        html! {
            div class="section-header" onclick={ "toggleSection('" (id) "')" } {
                h2 { (title) }
                span class="toggle" id={ (id) "-toggle" } { "\u{25bc}" }
            }
        }
    }

    fn legend_info() -> Markup {
        html! {
            div class="legend-info" {
                div class="legend-item" {
                    div class="legend-line" style="background: #8B0000; border-style: dashed;" {}
                    span { "Upper/Lower Limits" }
                }
                div class="legend-item" {
                    div class="legend-line" style="background: #2E7D32;" {}
                    span { "Reference Value" }
                }
                div class="legend-item" {
                    div class="legend-marker" style="background: #4472C4; transform: rotate(45deg);" {}
                    span { "Mean" }
                }
                div class="legend-item" {
                    div class="legend-line" style="background: #4472C4; height: 2px;" {}
                    span { "Mean \u{b1} 2\u{3c3}" }
                }
            }
        }
    }

    fn charts_section(&self) -> Markup {
        let unit = self.outcome.unit;
        html! {
            div class="section" {
                (Self::section_header("charts-section", "\u{1f4c8} Tolerance Charts"))
                div class="section-content collapsible active" id="charts-section" {
                    div class="chart-controls" {
                        button class="toggle-legend-btn legends-hidden" onclick="toggleAllLegends()" {
                            span id="legend-btn-icon" { "\u{1f441}\u{fe0f}\u{200d}\u{1f5e8}\u{fe0f}" }
                            " Toggle Legends"
                        }
                        (Self::legend_info())
                    }
                    div class="chart-grid" {
                        @for (idx, block) in self.blocks.iter().enumerate() {
                            div class="chart-container" {
                                div class={ "chart-title " (io_class(block.io_type)) } { (block.title(unit)) }
                                div class="chart-wrapper" {
                                    (PreEscaped(block_plot(block, &self.outcome.rows, unit)
                                        .to_inline_html(Some(format!("chart-{idx}").as_str()))))
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn select_filter(label: &str, id: &str, options: &[(String, String)]) -> Markup {
        html! {
            div class="filter-group" {
                label { (label) }
                select id=(id) onchange="filterTable()" {
                    option value="all" { "All" }
                    @for (value, text) in options {
                        option value=(value) { (text) }
                    }
                }
            }
        }
    }

    fn filter_bar(&self) -> Markup {
        let outcome = self.outcome;
        let same = |s: String| (s.clone(), s);
        let channels: Vec<_> = outcome.channels().into_iter().map(|c| same(c.to_string())).collect();
        let io_types: Vec<_> = outcome.io_types().into_iter().map(|io| same(io.to_string())).collect();
        let ranges: Vec<_> = outcome.ranges().into_iter().map(|r| same(r.to_owned())).collect();
        let values: Vec<_> = outcome
            .test_values()
            .into_iter()
            .map(|v| (format_value(v), format!("{} {}", format_value(v), outcome.unit)))
            .collect();
        let status = [
            ("pass".to_owned(), "Pass Only".to_owned()),
            ("fail".to_owned(), "Fail Only".to_owned()),
        ];
        html! {
            div class="filter-bar" {
                (Self::select_filter("Channel:", "channel-filter", &channels))
                (Self::select_filter("I/O Type:", "io-filter", &io_types))
                (Self::select_filter("Range:", "range-filter", &ranges))
                (Self::select_filter("Test Value:", "testvalue-filter", &values))
                (Self::select_filter("Status:", "status-filter", &status))
                div class="filter-group" {
                    label { "Search:" }
                    input type="text" id="search-input" placeholder="Search..." onkeyup="filterTable()";
                }
                button class="clear-filters-btn" onclick="clearFilters()" { "Clear All" }
                span class="filter-count" id="filter-count" {}
            }
        }
    }

    fn table_row(row: &ResultRow) -> Markup {
        let window = row.evaluation.as_ref().and_then(|e| e.limits.as_ref());
        let (mean_check, sigma_check) = row
            .evaluation
            .as_ref()
            .map_or((Verdict::Fail, Verdict::Fail), |e| (e.mean_check, e.sigma_check));
        let numbers = [
            Some(row.test_value),
            window.map(|l| l.reference),
            window.map(|l| l.tolerance),
            window.map(|l| l.lower),
            window.map(|l| l.upper),
            Some(row.stats.mean),
            row.stats.std_dev,
            Some(row.stats.min),
            Some(row.stats.max),
        ];
        html! {
            tr {
                td { (row.channel) }
                td { (row.io_type.as_str()) }
                td { (row.range_display) }
                @for value in numbers {
                    td { (fixed(value)) }
                }
                td { (row.stats.samples) }
                td class=(verdict_class(mean_check)) { (mean_check.as_str()) }
                td class=(verdict_class(sigma_check)) { (sigma_check.as_str()) }
            }
        }
    }

    fn table_section(&self) -> Markup {
        let unit = self.outcome.unit;
        let unit_headers = [
            "Test Value", "Reference", "Tolerance", "Lower Limit", "Upper Limit", "Mean", "StdDev",
            "Min", "Max",
        ];
        html! {
            div class="section" {
                (Self::section_header("data-section", "\u{1f4cb} Detailed Results"))
                div class="section-content collapsible active" id="data-section" {
                    (self.filter_bar())
                    div class="table-wrapper" {
                        table id="results-table" {
                            thead {
                                tr {
                                    th { "Channel" }
                                    th { "I/O Type" }
                                    th { "Range" }
                                    @for header in unit_headers {
                                        th { (header) " [" (unit.symbol()) "]" }
                                    }
                                    th { "Samples" }
                                    th { "Mean Check" }
                                    th { "Mean\u{b1}2\u{3c3} Check" }
                                }
                            }
                            tbody {
                                @for row in &self.outcome.rows {
                                    (Self::table_row(row))
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Render the full page.
    #[must_use]
    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { "Measurement Report - " (self.source_name) }
                    script src=(PLOTLY_CDN) {}
                    style { (PreEscaped(STYLE)) }
                }
                body {
                    (self.header())
                    div class="container" {
                        (self.summary_cards())
                        (self.charts_section())
                        (self.table_section())
                    }
                    script { (PreEscaped(SCRIPT)) }
                }
            }
        }
    }
}

/// Render the report for `outcome` and write it to `path`.
///
/// `source_name` is shown in the page title and header, normally the
/// workbook stem.
///
/// # Errors
///
/// Returns [`ReportError::LimitsRequired`] in raw mode,
/// [`ReportError::NoRows`] for an empty outcome and [`ReportError::Io`]
/// when the file cannot be written.
pub fn write_html_report(
    outcome: &ProcessOutcome,
    blocks: &[ChartBlock],
    source_name: &str,
    path: &Path,
) -> Result<(), ReportError> {
    if !outcome.limits_enabled {
        return Err(ReportError::LimitsRequired);
    }
    if outcome.rows.is_empty() {
        return Err(ReportError::NoRows);
    }

    let report = HtmlReport {
        outcome,
        blocks,
        source_name,
        generated_at: Local::now(),
    };
    std::fs::write(path, report.render().into_string()).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), charts = blocks.len(), "Saved HTML report");
    Ok(())
}
