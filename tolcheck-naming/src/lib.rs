//! Filename convention decoding for measurement exports.
//!
//! Test equipment exports carry the test point in their file name, e.g.
//! `VT2816A_m2V5_R10V_CH3.csv` (−2.5 V, range 10 V, channel 3) or
//! `VIO2004_3mA_R10mA_CH1.txt` (3 mA, range 10 mA, channel 1). This crate is
//! the single source of truth for decoding those names and is shared by the
//! processing pipeline and the HTTP front end.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Unit assumed when no file name carries a recognisable unit.
pub const DEFAULT_UNIT: Unit = Unit::Volt;

/// Errors from filename token decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    /// A value token could not be turned into a number.
    #[error("Invalid value token '{token}': {cause}")]
    Token {
        /// The raw token as it appears in the file name.
        token: String,
        /// Human-readable description of the problem.
        cause: String,
    },

    /// A unit string is not one of the supported measurement units.
    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),
}

/// Measurement unit decoded from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    Volt,
    MilliAmp,
    MicroAmp,
    Amp,
    Ohm,
    /// A bare number was found but no unit suffix.
    Unknown,
}

impl Unit {
    /// Short symbol used in column headers and chart titles.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Volt => "V",
            Self::MilliAmp => "mA",
            Self::MicroAmp => "uA",
            Self::Amp => "A",
            Self::Ohm => "Ohm",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this unit names a real physical quantity.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [
            Self::Volt,
            Self::MilliAmp,
            Self::MicroAmp,
            Self::Amp,
            Self::Ohm,
            Self::Unknown,
        ]
        .into_iter()
        .find(|unit| unit.symbol() == trimmed)
        .or_else(|| match trimmed.to_ascii_lowercase().as_str() {
            "v" | "volt" | "volts" => Some(Self::Volt),
            "ohms" | "ohm" => Some(Self::Ohm),
            _ => None,
        })
        .ok_or_else(|| NamingError::UnknownUnit(s.to_owned()))
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything that can be decoded from one file name.
///
/// Channel and range are independent of the value: they are reported even
/// when no value token is found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileNameInfo {
    /// Test value (signed).
    pub value: Option<f64>,
    /// Unit of the test value.
    pub unit: Option<Unit>,
    /// Channel number from a `_CH<n>` token. Absent for multi-channel files.
    pub channel: Option<u32>,
    /// Range setting as written, e.g. `10V` from `_R10V`.
    pub range: Option<String>,
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid filename regex {pattern}: {err}"),
    }
}

static CHANNEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)_CH(\d+)"));

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)_R(\d+(?:\.\d+)?)(V|mV|mA|uA|A|ohm|Ohm|kOhm|MOhm)(?:_|$)")
});

// Voltage tokens use `V` as the decimal point: m2V5, p7V5, 0V7, 10V.
static VOLTAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)_([mp]?\d+V\d*)(?:_|$)"));

static MILLIAMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)_([mp]?\d+(?:\.\d+)?)\s*mA(?:_|$)"));

static MICROAMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)_([mp]?\d+(?:\.\d+)?)\s*uA(?:_|$)"));

static AMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)_([mp]?\d+(?:\.\d+)?)\s*A(?:_|$)"));

static OHM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)_(\d+(?:\.\d+)?)[_\s]?ohms?(?:_|$)"));

static GENERIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"_([mp]?\d+(?:\.\d+)?)_"));

/// Return the file stem (name without directory and last extension).
#[must_use]
pub fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// Find the first match of `pattern` whose leading `_` is not directly
/// preceded by one of `forbidden` (compared case-insensitively).
///
/// Every pattern passed here starts with a literal `_`, so restarting one
/// byte after a rejected match start always lands on a char boundary.
fn find_not_preceded_by<'h>(
    pattern: &Regex,
    haystack: &'h str,
    forbidden: &[char],
) -> Option<Captures<'h>> {
    let mut start = 0;
    while start <= haystack.len() {
        let caps = pattern.captures_at(haystack, start)?;
        let whole = caps.get(0)?;
        let preceded = haystack[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| forbidden.iter().any(|f| f.eq_ignore_ascii_case(&c)));
        if !preceded {
            return Some(caps);
        }
        start = whole.start() + 1;
    }
    None
}

/// Split an optional `m` (minus) / `p` (plus) prefix off a value token.
fn split_sign(token: &str) -> (f64, &str) {
    let negative = token.starts_with(['m', 'M']);
    let digits = token.trim_start_matches(['m', 'M', 'p', 'P']);
    (if negative { -1.0 } else { 1.0 }, digits)
}

/// Parse a signed number token such as `m5`, `p10`, `3.3`.
///
/// # Errors
/// Returns [`NamingError::Token`] if the digits do not form a number.
pub fn parse_signed_number(token: &str) -> Result<f64, NamingError> {
    let (sign, digits) = split_sign(token);
    digits
        .parse::<f64>()
        .map(|v| sign * v)
        .map_err(|e| NamingError::Token {
            token: token.to_owned(),
            cause: e.to_string(),
        })
}

/// Parse a voltage token where `V` replaces the decimal point
/// (`m2V5` → −2.5, `10V` → 10, `0V7` → 0.7).
///
/// # Errors
/// Returns [`NamingError::Token`] if the token does not form a number.
pub fn parse_voltage_token(token: &str) -> Result<f64, NamingError> {
    let lowered = token.to_ascii_lowercase();
    let (sign, digits) = split_sign(&lowered);
    let decimal = digits.replace('v', ".");
    let decimal = decimal.strip_suffix('.').unwrap_or(&decimal);
    decimal
        .parse::<f64>()
        .map(|v| sign * v)
        .map_err(|e| NamingError::Token {
            token: token.to_owned(),
            cause: e.to_string(),
        })
}

fn decode_value(stem: &str) -> Option<(f64, Unit)> {
    if let Some(caps) = find_not_preceded_by(&VOLTAGE_PATTERN, stem, &['R'])
        && let Ok(v) = parse_voltage_token(&caps[1])
    {
        return Some((v, Unit::Volt));
    }

    let signed = [
        (&*MILLIAMP_PATTERN, &['R'][..], Unit::MilliAmp),
        (&*MICROAMP_PATTERN, &['R'][..], Unit::MicroAmp),
        (&*AMP_PATTERN, &['R', 'm', 'u'][..], Unit::Amp),
    ];
    for (pattern, forbidden, unit) in signed {
        if let Some(caps) = find_not_preceded_by(pattern, stem, forbidden)
            && let Ok(v) = parse_signed_number(&caps[1])
        {
            return Some((v, unit));
        }
    }

    if let Some(caps) = OHM_PATTERN.captures(stem)
        && let Ok(v) = caps[1].parse::<f64>()
    {
        return Some((v, Unit::Ohm));
    }

    if let Some(caps) = GENERIC_PATTERN.captures(stem)
        && let Ok(v) = parse_signed_number(&caps[1])
    {
        return Some((v, Unit::Unknown));
    }

    None
}

/// Decode test value, unit, channel and range setting from a file name.
///
/// Value patterns are tried in a fixed order (voltage, mA, uA, A, ohms,
/// bare number) and the first one that decodes wins.
#[must_use]
pub fn parse_filename(file_name: &str) -> FileNameInfo {
    let stem = file_stem(file_name);

    let channel = CHANNEL_PATTERN
        .captures(stem)
        .and_then(|caps| caps[1].parse::<u32>().ok());

    let range = RANGE_PATTERN
        .captures(stem)
        .map(|caps| format!("{}{}", &caps[1], &caps[2]));

    let (value, unit) = match decode_value(stem) {
        Some((v, u)) => (Some(v), Some(u)),
        None => (None, None),
    };

    FileNameInfo {
        value,
        unit,
        channel,
        range,
    }
}

/// Pick the workspace unit: the first known unit among `file_names`,
/// or [`DEFAULT_UNIT`].
#[must_use]
pub fn detect_unit<'a>(file_names: impl IntoIterator<Item = &'a str>) -> Unit {
    file_names
        .into_iter()
        .filter_map(|name| parse_filename(name).unit)
        .find(|unit| unit.is_known())
        .unwrap_or(DEFAULT_UNIT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    // ---- voltage ----

    #[test]
    fn test_negative_voltage_with_range_and_channel() {
        let info = parse_filename("VT2816A_m2V5_R10V_CH3.csv");
        assert_eq!(info.value, Some(-2.5));
        assert_eq!(info.unit, Some(Unit::Volt));
        assert_eq!(info.channel, Some(3));
        assert_eq!(info.range.as_deref(), Some("10V"));
    }

    #[test]
    fn test_whole_voltage_multi_channel_file() {
        let info = parse_filename("VT2816A_10V_R10V_1000x.txt");
        assert_eq!(info.value, Some(10.0));
        assert_eq!(info.unit, Some(Unit::Volt));
        assert_eq!(info.channel, None);
        assert_eq!(info.range.as_deref(), Some("10V"));
    }

    #[test]
    fn test_voltage_without_range() {
        let info = parse_filename("VT2516A_25V_1000x.txt");
        assert_eq!(info.value, Some(25.0));
        assert_eq!(info.range, None);
    }

    #[test]
    fn test_sub_volt_token() {
        let info = parse_filename("VN1630A_0V7_CH1_100x.txt");
        assert_eq!(info.value, Some(0.7));
        assert_eq!(info.channel, Some(1));
    }

    #[test]
    fn test_positive_prefix() {
        let info = parse_filename("DEV_p7V5_CH2.csv");
        assert_eq!(info.value, Some(7.5));
    }

    #[test]
    fn test_range_token_is_not_a_value() {
        // Only the range carries a unit; it must not be read as the test value.
        let info = parse_filename("DEV_R10V_CH1.csv");
        assert_eq!(info.value, None);
        assert_eq!(info.unit, None);
        assert_eq!(info.range.as_deref(), Some("10V"));
        assert_eq!(info.channel, Some(1));
    }

    #[test]
    fn test_value_after_rejected_candidate() {
        // `_1V_` is preceded by R and rejected; the scan resumes at its trailing `_`.
        let info = parse_filename("DEVR_1V_2V");
        assert_eq!(info.value, Some(2.0));
    }

    // ---- current ----

    #[test]
    fn test_milliamp_with_range() {
        let info = parse_filename("VIO2004_3mA_R10mA_CH1.txt");
        assert_eq!(info.value, Some(3.0));
        assert_eq!(info.unit, Some(Unit::MilliAmp));
        assert_eq!(info.range.as_deref(), Some("10mA"));
        assert_eq!(info.channel, Some(1));
    }

    #[test]
    fn test_negative_milliamp() {
        let info = parse_filename("PSU_m5mA_CH4.csv");
        assert_eq!(info.value, Some(-5.0));
        assert_eq!(info.unit, Some(Unit::MilliAmp));
    }

    #[test]
    fn test_microamp() {
        let info = parse_filename("SRC_100uA_CH2.csv");
        assert_eq!(info.value, Some(100.0));
        assert_eq!(info.unit, Some(Unit::MicroAmp));
    }

    #[test]
    fn test_amp() {
        let info = parse_filename("LOAD_2A_CH1.csv");
        assert_eq!(info.value, Some(2.0));
        assert_eq!(info.unit, Some(Unit::Amp));
    }

    // ---- resistance / generic ----

    #[test]
    fn test_ohms_variants() {
        assert_eq!(parse_filename("RES_10_ohms_CH1.csv").value, Some(10.0));
        assert_eq!(parse_filename("RES_100ohm.csv").unit, Some(Unit::Ohm));
    }

    #[test]
    fn test_generic_number() {
        let info = parse_filename("DEV_m12.5_CH1.csv");
        assert_eq!(info.value, Some(-12.5));
        assert_eq!(info.unit, Some(Unit::Unknown));
    }

    #[test]
    fn test_nothing_decodable_keeps_channel() {
        let info = parse_filename("notes_CH7.txt");
        assert_eq!(info.value, None);
        assert_eq!(info.unit, None);
        assert_eq!(info.channel, Some(7));
    }

    #[test]
    fn test_channel_is_case_insensitive() {
        assert_eq!(parse_filename("DEV_5V_ch12.csv").channel, Some(12));
    }

    // ---- tokens and units ----

    #[test]
    fn test_parse_voltage_token() {
        assert_eq!(parse_voltage_token("m2V5").unwrap(), -2.5);
        assert_eq!(parse_voltage_token("10V").unwrap(), 10.0);
        assert!(parse_voltage_token("V").is_err());
    }

    #[test]
    fn test_parse_signed_number_error_names_token() {
        let err = parse_signed_number("mx").unwrap_err();
        assert!(err.to_string().contains("'mx'"), "got: {err}");
    }

    #[test]
    fn test_unit_round_trip_through_str() {
        for unit in [Unit::Volt, Unit::MilliAmp, Unit::MicroAmp, Unit::Amp, Unit::Ohm] {
            assert_eq!(unit.symbol().parse::<Unit>().unwrap(), unit);
        }
        assert!("furlong".parse::<Unit>().is_err());
    }

    #[test]
    fn test_detect_unit_skips_unknown() {
        let names = ["DEV_12_x.csv", "PSU_3mA_CH1.csv"];
        assert_eq!(detect_unit(names), Unit::MilliAmp);
        assert_eq!(detect_unit(["readme.txt"]), DEFAULT_UNIT);
    }
}
