//! Filename metadata extraction
//!
//! Measurement files carry their provenance in the filename, e.g.
//! `SN1234_PRI_L567890_AMB_20240101.s2p`. Tokens are split on any
//! non-alphanumeric character and classified independently of their
//! position. Parsing never fails: unrecognized tokens are reported in
//! `unknown_tokens`, absent categories in `missing_tokens`.
//!
//! Tie-break: when several tokens match the same category, the first one
//! encountered wins and the rest are reported as unknown.
//!
//! Six-digit dates (`YYMMDD`) always resolve to 20YY.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Number of digits following the `L` prefix of a lot number
pub const LOT_DIGITS: usize = 6;

/// Minimum width of a serial number; shorter serials are zero-padded
pub const SERIAL_MIN_WIDTH: usize = 4;

// The patterns below are literals; compilation cannot fail.
#[allow(clippy::unwrap_used)]
static SERIAL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^sn(\d+)$").unwrap());

#[allow(clippy::unwrap_used)]
static PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(pri|primary|red|redundant)$").unwrap());

#[allow(clippy::unwrap_used)]
static LOT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)^l(\d{{{LOT_DIGITS}}})$")).unwrap());

#[allow(clippy::unwrap_used)]
static CONDITION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(amb|ambient|hot|cld|cold)$").unwrap());

#[allow(clippy::unwrap_used)]
static DATE8_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

#[allow(clippy::unwrap_used)]
static DATE6_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})(\d{2})$").unwrap());

/// Signal path of the unit under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PathLabel {
    /// Primary path (PRI)
    #[serde(alias = "PRI")]
    Primary,
    /// Redundant path (RED)
    #[serde(alias = "RED")]
    Redundant,
}

impl PathLabel {
    /// Short token form as it appears in filenames
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Primary => "PRI",
            Self::Redundant => "RED",
        }
    }
}

impl fmt::Display for PathLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Environmental condition during measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    /// Room temperature (AMB)
    Ambient,
    /// Hot soak (HOT)
    Hot,
    /// Cold soak (CLD)
    Cold,
}

/// Metadata tokens recovered from a filename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    /// Serial number digits, zero-padded to at least four places
    pub serial_number: Option<String>,
    /// Signal path
    pub path: Option<PathLabel>,
    /// Lot number digits
    pub lot_number: Option<String>,
    /// Environmental condition
    pub condition: Option<Condition>,
    /// Measurement date
    pub date: Option<NaiveDate>,
    /// Categories with no matching token
    pub missing_tokens: Vec<String>,
    /// Tokens that matched no category, sorted
    pub unknown_tokens: Vec<String>,
}

impl ParsedMetadata {
    /// True when every category was found
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_tokens.is_empty()
    }
}

/// Caller-supplied corrections applied over parsed metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOverrides {
    /// Serial number override
    pub serial_number: Option<String>,
    /// Path override
    pub path: Option<PathLabel>,
    /// Lot number override
    pub lot_number: Option<String>,
    /// Condition override
    pub condition: Option<Condition>,
    /// Date override
    pub date: Option<NaiveDate>,
}

/// Parsed metadata with overrides applied; overrides win field by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveMetadata {
    /// Serial number
    pub serial_number: Option<String>,
    /// Signal path
    pub path: Option<PathLabel>,
    /// Lot number
    pub lot_number: Option<String>,
    /// Environmental condition
    pub condition: Option<Condition>,
    /// Measurement date
    pub date: Option<NaiveDate>,
}

impl EffectiveMetadata {
    /// Merge parsed metadata with optional overrides
    #[must_use]
    pub fn resolve(parsed: &ParsedMetadata, overrides: Option<&MetadataOverrides>) -> Self {
        let o = overrides.cloned().unwrap_or_default();
        Self {
            serial_number: o.serial_number.or_else(|| parsed.serial_number.clone()),
            path: o.path.or(parsed.path),
            lot_number: o.lot_number.or_else(|| parsed.lot_number.clone()),
            condition: o.condition.or(parsed.condition),
            date: o.date.or(parsed.date),
        }
    }
}

impl From<&ParsedMetadata> for EffectiveMetadata {
    fn from(parsed: &ParsedMetadata) -> Self {
        Self::resolve(parsed, None)
    }
}

/// Split a filename into classification tokens
///
/// The final `.ext` suffix is dropped first, then the stem is split on every
/// non-alphanumeric character.
#[must_use]
pub fn tokenize(filename: &str) -> Vec<&str> {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse metadata tokens from a measurement filename
#[must_use]
pub fn parse_filename(filename: &str) -> ParsedMetadata {
    let mut meta = ParsedMetadata::default();
    let mut unknown = Vec::new();

    for token in tokenize(filename) {
        let claimed = classify(token, &mut meta);
        if !claimed {
            unknown.push(token.to_string());
        }
    }

    let checks = [
        ("serial_number", meta.serial_number.is_none()),
        ("path", meta.path.is_none()),
        ("lot_number", meta.lot_number.is_none()),
        ("condition", meta.condition.is_none()),
        ("date", meta.date.is_none()),
    ];
    meta.missing_tokens = checks
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| (*name).to_string())
        .collect();

    unknown.sort();
    meta.unknown_tokens = unknown;
    meta
}

/// Try to place a token into its category; returns false if nothing claimed it
fn classify(token: &str, meta: &mut ParsedMetadata) -> bool {
    if let Some(caps) = SERIAL_REGEX.captures(token) {
        return fill(&mut meta.serial_number, || {
            format!("{:0>width$}", &caps[1], width = SERIAL_MIN_WIDTH)
        });
    }
    if PATH_REGEX.is_match(token) {
        return fill(&mut meta.path, || match token.to_ascii_uppercase().as_str() {
            "PRI" | "PRIMARY" => PathLabel::Primary,
            _ => PathLabel::Redundant,
        });
    }
    if let Some(caps) = LOT_REGEX.captures(token) {
        return fill(&mut meta.lot_number, || caps[1].to_string());
    }
    if CONDITION_REGEX.is_match(token) {
        return fill(&mut meta.condition, || {
            match token.to_ascii_uppercase().as_str() {
                "AMB" | "AMBIENT" => Condition::Ambient,
                "HOT" => Condition::Hot,
                _ => Condition::Cold,
            }
        });
    }
    if let Some(date) = parse_date_token(token) {
        return fill(&mut meta.date, || date);
    }
    false
}

/// First match per category wins
fn fill<T>(slot: &mut Option<T>, value: impl FnOnce() -> T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value());
    true
}

/// Parse `YYYYMMDD` or `YYMMDD`; calendar-invalid digit runs yield `None`
#[must_use]
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let (year, month, day) = if let Some(caps) = DATE8_REGEX.captures(token) {
        (
            caps[1].parse::<i32>().ok()?,
            caps[2].parse::<u32>().ok()?,
            caps[3].parse::<u32>().ok()?,
        )
    } else if let Some(caps) = DATE6_REGEX.captures(token) {
        (
            2000 + caps[1].parse::<i32>().ok()?,
            caps[2].parse::<u32>().ok()?,
            caps[3].parse::<u32>().ok()?,
        )
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
