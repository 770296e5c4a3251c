//! Text exports from input devices.
//!
//! Three layouts are recognised, tried in this order:
//!
//! 1. hierarchical task logs
//!    (`|  Voltage_Ch01   -2.498169   V   ...`);
//! 2. flat logs with the channel in the signal name
//!    (`66.001210   VT2816_1_Ch1::CurVoltage    10.011883`);
//! 3. flat logs without a channel (`15.001821   VN1600_1::AIN   0.686400`),
//!    where the channel comes from the file name.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Lines inspected when looking for measurement type names.
pub const TYPE_SCAN_LINES: usize = 500;

/// Channel used for channel-less flat logs whose file name has no channel.
pub const DEFAULT_CHANNEL: u32 = 1;

/// Samples per channel, ordered by channel number.
pub type ChannelData = BTreeMap<u32, Vec<f64>>;

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid text format regex {pattern}: {err}"),
    }
}

static HIERARCHICAL_TYPE: LazyLock<Regex> = LazyLock::new(|| compile(r"\|\s+(\w+)_Ch\d+"));

static FLAT_TYPE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)_Ch\d+::(\w+)"));

static HIERARCHICAL_ROW: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\|\s+(\w+)_Ch(\d+)\s+(-?\d+\.?\d*)\s+(\w+)"));

static FLAT_ROW: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*[\d.]+\s+\S+_Ch(\d+)::(\w+)\s+(-?\d+\.?\d*)"));

static SIMPLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\s*[\d.]+\s+\S+\s+(-?\d+\.?\d*)\s*$"));

/// Collect the measurement type names present in a text export.
///
/// Only the first [`TYPE_SCAN_LINES`] lines are inspected. Hierarchical
/// names win; flat `::<Type>` names are only considered when no
/// hierarchical name was found.
#[must_use]
pub fn scan_measurement_types(content: &str) -> BTreeSet<String> {
    let head = || content.trim().lines().take(TYPE_SCAN_LINES);

    let hierarchical: BTreeSet<String> = head()
        .filter_map(|line| HIERARCHICAL_TYPE.captures(line))
        .map(|caps| caps[1].to_owned())
        .collect();
    if !hierarchical.is_empty() {
        return hierarchical;
    }

    head()
        .filter_map(|line| FLAT_TYPE.captures(line))
        .map(|caps| caps[1].to_owned())
        .collect()
}

fn wanted(selected: Option<&str>, found: &str) -> bool {
    selected.is_none_or(|s| s == found)
}

fn push_sample(data: &mut ChannelData, channel: &str, value: &str) {
    if let (Ok(channel), Ok(value)) = (channel.parse::<u32>(), value.parse::<f64>()) {
        data.entry(channel).or_default().push(value);
    }
}

/// Parse a text export into samples per channel.
///
/// `selected_type` restricts the hierarchical and flat layouts to one
/// measurement type. `channel_from_filename` is used by the channel-less
/// layout, falling back to [`DEFAULT_CHANNEL`]. An empty map means no
/// layout matched.
#[must_use]
pub fn parse_text(
    content: &str,
    selected_type: Option<&str>,
    channel_from_filename: Option<u32>,
) -> ChannelData {
    let content = content.trim();
    let mut data = ChannelData::new();

    let mut saw_hierarchical = false;
    for caps in content.lines().filter_map(|l| HIERARCHICAL_ROW.captures(l)) {
        saw_hierarchical = true;
        if wanted(selected_type, &caps[1]) {
            push_sample(&mut data, &caps[2], &caps[3]);
        }
    }
    if !data.is_empty() {
        debug!(channels = data.len(), "Parsed hierarchical text export");
        return data;
    }
    if saw_hierarchical {
        debug!(?selected_type, "Hierarchical rows present but none of the selected type");
    }

    for caps in content.lines().filter_map(|l| FLAT_ROW.captures(l)) {
        if wanted(selected_type, &caps[2]) {
            push_sample(&mut data, &caps[1], &caps[3]);
        }
    }
    if !data.is_empty() {
        debug!(channels = data.len(), "Parsed flat text export");
        return data;
    }

    let values: Vec<f64> = content
        .lines()
        .filter_map(|l| SIMPLE_ROW.captures(l))
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect();
    if !values.is_empty() {
        let channel = channel_from_filename.unwrap_or(DEFAULT_CHANNEL);
        debug!(channel, samples = values.len(), "Parsed channel-less text export");
        data.insert(channel, values);
    }

    data
}
