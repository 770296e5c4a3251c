//! Chart blocks and channel colour assignment.
//!
//! A block is every result row sharing test value, displayed range and I/O
//! type. Both the workbook and the HTML report draw one chart per block and
//! colour each channel by its position inside the block, so the colours are
//! computed once here and reused by both writers.

use std::cmp::Ordering;

use tolcheck::{IoType, Limits, NO_RANGE, ResultRow, Unit, format_value};

use crate::palette::channel_color;

/// One chart: rows of a (test value, range, I/O type) group.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBlock {
    pub test_value: f64,
    pub range_display: String,
    pub io_type: IoType,
    /// Indices into the result rows, sorted by channel.
    pub rows: Vec<usize>,
}

impl ChartBlock {
    /// `Test: <value> <unit>[, Range: <range>] (<io>)`.
    #[must_use]
    pub fn title(&self, unit: Unit) -> String {
        let range = if self.range_display == NO_RANGE {
            String::new()
        } else {
            format!(", Range: {}", self.range_display)
        };
        format!(
            "Test: {} {unit}{range} ({})",
            format_value(self.test_value),
            self.io_type
        )
    }

    /// Limits of the first row in the block that has them.
    #[must_use]
    pub fn limits<'a>(&self, rows: &'a [ResultRow]) -> Option<&'a Limits> {
        self.rows
            .iter()
            .filter_map(|&i| rows[i].evaluation.as_ref())
            .find_map(|e| e.limits.as_ref())
    }

    /// Channel numbers in block order.
    #[must_use]
    pub fn channels(&self, rows: &[ResultRow]) -> Vec<u32> {
        self.rows.iter().map(|&i| rows[i].channel).collect()
    }
}

fn block_order(a: &ChartBlock, b: &ChartBlock) -> Ordering {
    a.test_value
        .total_cmp(&b.test_value)
        .then_with(|| a.range_display.cmp(&b.range_display))
        .then_with(|| a.io_type.cmp(&b.io_type))
}

/// Group rows into chart blocks, ordered by test value, range, I/O type.
#[must_use]
pub fn chart_blocks(rows: &[ResultRow]) -> Vec<ChartBlock> {
    let mut blocks: Vec<ChartBlock> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let existing = blocks.iter_mut().find(|b| {
            b.test_value.to_bits() == row.test_value.to_bits()
                && b.range_display == row.range_display
                && b.io_type == row.io_type
        });
        match existing {
            Some(block) => block.rows.push(idx),
            None => blocks.push(ChartBlock {
                test_value: row.test_value,
                range_display: row.range_display.clone(),
                io_type: row.io_type,
                rows: vec![idx],
            }),
        }
    }

    for block in &mut blocks {
        block.rows.sort_by_key(|&i| rows[i].channel);
    }
    blocks.sort_by(block_order);
    blocks
}

/// Palette colour for every row, by its position within its block.
#[must_use]
pub fn row_colors(blocks: &[ChartBlock], row_count: usize) -> Vec<Option<u32>> {
    let mut colors = vec![None; row_count];
    for block in blocks {
        for (position, &idx) in block.rows.iter().enumerate() {
            if let Some(slot) = colors.get_mut(idx) {
                *slot = Some(channel_color(position));
            }
        }
    }
    colors
}
