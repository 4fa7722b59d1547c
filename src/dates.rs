use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize, Serializer};

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2}|XX)-([0-9]{2}|XX)$").expect("valid date pattern"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})$").expect("valid date pattern"));
static YEAR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})$").expect("valid date pattern"));

const UNKNOWN: &str = "XX";

/// A collection date in `YYYY-MM-DD` form, with `XX` standing in for an
/// unknown month or day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedDate(String);

impl NormalizedDate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NormalizedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Normalizes `YYYY-MM-DD`, `YYYY-MM` or `YYYY`; anything else is `None`.
///
/// Already normalized values (`2020-05-XX`, `2020-XX-XX`) come back unchanged.
pub fn normalize_date(raw: &str) -> Option<NormalizedDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(caps) = FULL_DATE.captures(value) {
        let (year, month, day) = (&caps[1], &caps[2], &caps[3]);
        return match (month, day) {
            (UNKNOWN, UNKNOWN) => Some(placeholder(year, None)),
            (UNKNOWN, _) => None,
            (month, UNKNOWN) => valid_month(month).then(|| placeholder(year, Some(month))),
            (month, day) => {
                let date = NaiveDate::from_ymd_opt(
                    year.parse().ok()?,
                    month.parse().ok()?,
                    day.parse().ok()?,
                )?;
                Some(NormalizedDate(date.format("%Y-%m-%d").to_string()))
            }
        };
    }

    if let Some(caps) = YEAR_MONTH.captures(value) {
        let month = &caps[2];
        return valid_month(month).then(|| placeholder(&caps[1], Some(month)));
    }

    YEAR_ONLY
        .captures(value)
        .map(|caps| placeholder(&caps[1], None))
}

fn valid_month(month: &str) -> bool {
    month
        .parse::<u32>()
        .map(|value| (1..=12).contains(&value))
        .unwrap_or(false)
}

fn placeholder(year: &str, month: Option<&str>) -> NormalizedDate {
    NormalizedDate(format!("{year}-{}-{UNKNOWN}", month.unwrap_or(UNKNOWN)))
}
