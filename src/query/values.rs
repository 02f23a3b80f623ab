/*!
# Filter Values

Parsing, checking and normalization of filter values for each
[`ValueType`]:

- numbers with an optional magnitude suffix (`k`, `m`, `b`)
- durations `<number><unit>` with units `ms`, `s`, `m`, `h`, `d`, `w`
  (a bare number is milliseconds)
- percentages, either a ratio (`0.7`) or a number with a trailing `%`
  (`70%`, stored as `0.7`)
- dates, either relative (`-24h`, `+7d`) or absolute ISO-8601 timestamps
- booleans (`true`, `false`, `1`, `0`)
*/
use chrono::{
    DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone,
    Utc,
};
use regex::Regex;
use std::{fmt::Display, sync::LazyLock};

use crate::query::InvalidReason;
use crate::schema::ValueType;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?|-?\.\d+)([kKmMbB])?$").expect("valid regex")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)(ms|s|m|h|d|w)?$").expect("valid regex")
});

static PERCENTAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)(%)?$").expect("valid regex")
});

static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])(\d+)([mhdw])$").expect("valid regex")
});

/// Parse a number with an optional magnitude suffix into its base value.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    let caps = NUMBER_RE.captures(text.trim())?;
    let base: f64 = caps[1].parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1.0,
        Some(suffix) => match suffix.as_str() {
            "k" => 1e3,
            "m" => 1e6,
            "b" => 1e9,
            _ => return None,
        },
    };
    Some(base * multiplier)
}

/// Duration units, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    /// `ms`
    Milliseconds,
    /// `s`
    Seconds,
    /// `m`
    Minutes,
    /// `h`
    Hours,
    /// `d`
    Days,
    /// `w`
    Weeks,
}

impl DurationUnit {
    /// Every unit, in suggestion order.
    pub const ALL: [Self; 6] = [
        Self::Milliseconds,
        Self::Seconds,
        Self::Minutes,
        Self::Hours,
        Self::Days,
        Self::Weeks,
    ];

    /// Query-string suffix.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
        }
    }

    /// Human readable plural name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        }
    }

    /// Length of one unit in milliseconds.
    #[must_use]
    pub const fn millis(self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
            Self::Weeks => 604_800_000,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.suffix() == suffix)
    }
}

/// A parsed duration value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationValue {
    /// Numeric part as written
    pub amount: f64,
    /// Unit (defaults to milliseconds)
    pub unit: DurationUnit,
}

impl DurationValue {
    /// Total length in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_millis(&self) -> f64 {
        self.amount * self.unit.millis() as f64
    }
}

impl Display for DurationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// Parse a duration, defaulting to milliseconds when no unit is given.
#[must_use]
pub fn parse_duration(text: &str) -> Option<DurationValue> {
    let caps = DURATION_RE.captures(text.trim())?;
    let amount: f64 = caps[1].parse().ok()?;
    let unit = caps
        .get(2)
        .map_or(Some(DurationUnit::Milliseconds), |m| {
            DurationUnit::from_suffix(m.as_str())
        })?;
    Some(DurationValue { amount, unit })
}

/// Parse a percentage into a ratio: `70%` -> `0.7`, `0.7` -> `0.7`.
#[must_use]
pub fn parse_percentage(text: &str) -> Option<f64> {
    let caps = PERCENTAGE_RE.captures(text.trim())?;
    let amount: f64 = caps[1].parse().ok()?;
    if caps.get(2).is_some() {
        Some(amount / 100.0)
    } else {
        Some(amount)
    }
}

/// Parse a boolean value.
#[must_use]
pub fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Direction of a relative date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeSign {
    /// `-24h`: within the last 24 hours ("is after 24 hours ago")
    Past,
    /// `+24h`: older than 24 hours ("is before 24 hours ago")
    Older,
}

/// Units of relative dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    /// `m`
    Minutes,
    /// `h`
    Hours,
    /// `d`
    Days,
    /// `w`
    Weeks,
}

impl RelativeUnit {
    /// Every unit, smallest first.
    pub const ALL: [Self; 4] =
        [Self::Minutes, Self::Hours, Self::Days, Self::Weeks];

    /// Query-string suffix.
    #[must_use]
    pub const fn suffix(self) -> char {
        match self {
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
            Self::Weeks => 'w',
        }
    }

    /// Human readable plural name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        }
    }

    const fn minutes(self) -> i64 {
        match self {
            Self::Minutes => 1,
            Self::Hours => 60,
            Self::Days => 24 * 60,
            Self::Weeks => 7 * 24 * 60,
        }
    }

    /// Offset of `amount` units, or `None` past [`MAX_RELATIVE_MINUTES`].
    fn offset(self, amount: u32) -> Option<Duration> {
        let minutes = i64::from(amount).checked_mul(self.minutes())?;
        (minutes <= MAX_RELATIVE_MINUTES).then(|| Duration::minutes(minutes))
    }
}

/// Furthest reach of a relative date (about 190,000 years), inside the
/// range of representable timestamps.
const MAX_RELATIVE_MINUTES: i64 = 100_000_000_000;

/// A parsed date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    /// Relative to the current time: sign, magnitude and unit
    Relative {
        /// Direction
        sign: RelativeSign,
        /// Magnitude
        amount: u32,
        /// Unit
        unit: RelativeUnit,
    },
    /// Absolute timestamp
    Absolute(DateTime<Utc>),
}

impl DateValue {
    /// Resolves the value to an absolute timestamp given the current time,
    /// or `None` if that timestamp is not representable.
    #[must_use]
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Absolute(ts) => Some(ts),
            Self::Relative { amount, unit, .. } => {
                now.checked_sub_signed(unit.offset(amount)?)
            }
        }
    }

    /// Same relative value with the opposite meaning; absolute values are
    /// returned unchanged.
    #[must_use]
    pub const fn with_sign(self, sign: RelativeSign) -> Self {
        match self {
            Self::Relative { amount, unit, .. } => {
                Self::Relative { sign, amount, unit }
            }
            absolute @ Self::Absolute(_) => absolute,
        }
    }

    /// Returns `true` for relative values.
    #[must_use]
    pub const fn is_relative(&self) -> bool {
        matches!(self, Self::Relative { .. })
    }
}

impl Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relative { sign, amount, unit } => {
                let sign = match sign {
                    RelativeSign::Past => '-',
                    RelativeSign::Older => '+',
                };
                write!(f, "{sign}{amount}{}", unit.suffix())
            }
            Self::Absolute(ts) => write!(f, "{}", format_timestamp(*ts)),
        }
    }
}

/// Format a timestamp the way absolute date values are written.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a relative (`-24h`) or absolute ISO-8601 date, with or without a
/// time and timezone.
#[must_use]
pub fn parse_date(text: &str) -> Option<DateValue> {
    let text = text.trim();
    if let Some(caps) = RELATIVE_DATE_RE.captures(text) {
        let sign = if &caps[1] == "-" {
            RelativeSign::Past
        } else {
            RelativeSign::Older
        };
        let amount: u32 = caps[2].parse().ok()?;
        let unit = match &caps[3] {
            "m" => RelativeUnit::Minutes,
            "h" => RelativeUnit::Hours,
            "d" => RelativeUnit::Days,
            _ => RelativeUnit::Weeks,
        };
        unit.offset(amount)?;
        return Some(DateValue::Relative { sign, amount, unit });
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(DateValue::Absolute(ts.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(DateValue::Absolute(Utc.from_utc_datetime(&naive)));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateValue::Absolute(Utc.from_utc_datetime(&naive)))
}

/// Check a single value against a value type, returning the reason it is
/// rejected.
///
/// String values are always accepted; wildcard policy is applied by the
/// validity engine.
#[must_use]
pub fn check_value(value_type: ValueType, value: &str) -> Option<InvalidReason> {
    match value_type {
        ValueType::String => None,
        ValueType::Number => parse_number(value)
            .is_none()
            .then_some(InvalidReason::InvalidNumber),
        ValueType::Integer => parse_number(value)
            .is_none_or(|n| n.fract() != 0.0)
            .then_some(InvalidReason::InvalidNumber),
        ValueType::Duration => parse_duration(value)
            .is_none()
            .then_some(InvalidReason::InvalidDuration),
        ValueType::Percentage => parse_percentage(value)
            .is_none()
            .then_some(InvalidReason::InvalidPercentage),
        ValueType::Date => {
            parse_date(value).is_none().then_some(InvalidReason::InvalidDate)
        }
        ValueType::Boolean => parse_boolean(value)
            .is_none()
            .then_some(InvalidReason::InvalidBoolean),
    }
}

/// Normalize a value typed by the user into its committed form, or return
/// the reason it is rejected: `7` -> `7ms` for durations, `70%` -> `0.7`
/// for percentages, `TRUE` -> `true` for booleans.
///
/// # Errors
///
/// Returns the [`InvalidReason`] for values that do not parse as
/// `value_type`.
pub fn normalize_value(
    value_type: ValueType,
    value: &str,
) -> Result<String, InvalidReason> {
    if let Some(reason) = check_value(value_type, value) {
        return Err(reason);
    }
    let value = value.trim();
    Ok(match value_type {
        ValueType::Duration => parse_duration(value)
            .map_or_else(|| value.to_string(), |d| d.to_string()),
        ValueType::Percentage => parse_percentage(value)
            .map_or_else(|| value.to_string(), |p| p.to_string()),
        ValueType::Boolean => parse_boolean(value)
            .map_or_else(|| value.to_string(), |b| b.to_string()),
        _ => value.to_string(),
    })
}
