//! Colours shared by the workbook and the HTML report.

/// Muted channel palette, indexed by a channel's position in its chart block.
pub const CHANNEL_COLORS: [u32; 16] = [
    0x0044_72C4, // blue
    0x00C4_5B5B, // red
    0x0070_AD47, // green
    0x00ED_7D31, // orange
    0x007B_7B7B, // gray
    0x009E_5ECE, // purple
    0x0043_A6A2, // teal
    0x00C4_A24E, // gold
    0x005B_9BC4, // steel blue
    0x00A8_5B5B, // dusty rose
    0x005B_AF7B, // sea green
    0x00C4_7B4E, // terracotta
    0x006B_6BAF, // indigo
    0x008B_6BAF, // violet
    0x004E_AFAF, // turquoise
    0x00AF_8B4E, // bronze
];

pub const LIMIT_COLOR: u32 = 0x008B_0000;
pub const REFERENCE_COLOR: u32 = 0x002E_7D32;
pub const TITLE_COLOR: u32 = 0x001F_4E78;

pub const PASS_FILL: u32 = 0x00C6_EFCE;
pub const PASS_FONT: u32 = 0x0000_6100;
pub const FAIL_FILL: u32 = 0x00FF_C7CE;
pub const FAIL_FONT: u32 = 0x009C_0006;

/// Colour for the `position`-th channel of a block.
#[must_use]
pub fn channel_color(position: usize) -> u32 {
    CHANNEL_COLORS[position % CHANNEL_COLORS.len()]
}

/// `#RRGGBB` form for HTML and Plotly.
#[must_use]
pub fn css_hex(color: u32) -> String {
    format!("#{color:06X}")
}
