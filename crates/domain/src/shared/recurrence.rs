use chrono::{DateTime, NaiveDateTime, TimeZone, Utc, Weekday};
use itertools::Itertools;
use serde::{de::Visitor, Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Timestamp format used inside the canonical rule string for `UNTIL` and
/// `EXDATE` values (UTC, no separators).
const RULE_TS_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Yearly => "YEARLY",
            Self::Monthly => "MONTHLY",
            Self::Weekly => "WEEKLY",
            Self::Daily => "DAILY",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Frequency {
    type Err = InvalidRecurrenceRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "YEARLY" => Ok(Self::Yearly),
            "MONTHLY" => Ok(Self::Monthly),
            "WEEKLY" => Ok(Self::Weekly),
            "DAILY" => Ok(Self::Daily),
            _ => Err(InvalidRecurrenceRuleError::UnknownFrequency(s.to_string())),
        }
    }
}

/// A `BYDAY` entry: a weekday, optionally prefixed with a signed ordinal
/// restricting it to the nth (or nth-from-last) such weekday of the month.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekDaySpec {
    n: Option<i32>,
    weekday: Weekday,
}

impl WeekDaySpec {
    fn create(weekday: Weekday, n: Option<i32>) -> Result<Self, ()> {
        if let Some(n) = n {
            if n == 0 || n <= -500 || n >= 500 {
                return Err(());
            }
        }
        Ok(Self { weekday, n })
    }

    pub fn new(weekday: Weekday) -> Self {
        Self { weekday, n: None }
    }

    pub fn new_nth(weekday: Weekday, n: i32) -> Result<Self, ()> {
        Self::create(weekday, Some(n))
    }

    pub fn nth(&self) -> Option<i32> {
        self.n
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    /// True when this entry pins a plain weekday with no ordinal, i.e. the
    /// kind of marker that is re-derived from the series start on save.
    pub fn is_plain(&self) -> bool {
        self.n.is_none()
    }
}

fn str_to_weekday(d: &str) -> Result<Weekday, InvalidRecurrenceRuleError> {
    match d.to_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(InvalidRecurrenceRuleError::InvalidWeekday(d.to_string())),
    }
}

fn weekday_to_str(wday: Weekday) -> &'static str {
    match wday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

impl Display for WeekDaySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.n {
            Some(n) => write!(f, "{}{}", n, weekday_to_str(self.weekday)),
            None => write!(f, "{}", weekday_to_str(self.weekday)),
        }
    }
}

impl FromStr for WeekDaySpec {
    type Err = InvalidRecurrenceRuleError;

    fn from_str(day: &str) -> Result<Self, Self::Err> {
        let e = InvalidRecurrenceRuleError::InvalidWeekday(day.to_string());
        if day.len() < 2 {
            return Err(e);
        }
        if day.len() == 2 {
            // MO, TU, ...
            return Ok(WeekDaySpec::new(str_to_weekday(day)?));
        }
        let wday = str_to_weekday(&day[day.len() - 2..])?;
        let n = match day[0..day.len() - 2].parse::<i32>() {
            Ok(n) => n,
            Err(_) => return Err(e),
        };
        WeekDaySpec::new_nth(wday, n).map_err(|_| e)
    }
}

impl Serialize for WeekDaySpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WeekDaySpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct WeekDaySpecVisitor;

        impl<'de> Visitor<'de> for WeekDaySpecVisitor {
            type Value = WeekDaySpec;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("A valid string representation of weekday")
            }

            fn visit_str<E>(self, value: &str) -> Result<WeekDaySpec, E>
            where
                E: serde::de::Error,
            {
                value
                    .parse::<WeekDaySpec>()
                    .map_err(|_| E::custom(format!("Malformed weekday: {}", value)))
            }
        }

        deserializer.deserialize_str(WeekDaySpecVisitor)
    }
}

#[derive(Error, Debug)]
pub enum InvalidRecurrenceRuleError {
    #[error("Unknown recurrence frequency: {0}")]
    UnknownFrequency(String),
    #[error("Invalid weekday specified: {0}")]
    InvalidWeekday(String),
    #[error("Malformed recurrence rule part: {0}")]
    Malformed(String),
}

/// Structured recurrence rule.
///
/// The canonical persisted form is the `KEY=VALUE;KEY=VALUE` string emitted
/// by [`Display`] (no trailing semicolon), with `UNTIL` and `EXDATE` values
/// as UTC `Ymd\THis` timestamps and `EXDATE` comma-joined.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub byday: Vec<WeekDaySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bymonth: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exdates: Vec<DateTime<Utc>>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            freq: Frequency::Daily,
            interval: 1,
            count: None,
            until: None,
            byday: Vec::new(),
            bymonth: Vec::new(),
            exdates: Vec::new(),
        }
    }
}

fn format_rule_ts(ts: &DateTime<Utc>) -> String {
    ts.format(RULE_TS_FORMAT).to_string()
}

fn parse_rule_ts(s: &str) -> Result<DateTime<Utc>, InvalidRecurrenceRuleError> {
    // Tolerate a trailing Z as found in iCalendar input.
    let s = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(s, RULE_TS_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| InvalidRecurrenceRuleError::Malformed(s.to_string()))
}

impl RecurrenceRule {
    pub fn is_valid(&self, start: DateTime<Utc>) -> bool {
        if self.interval < 1 {
            return false;
        }
        if let Some(count) = self.count {
            if count < 1 || count > 999 {
                return false;
            }
        }
        if let Some(until) = self.until {
            if until < start {
                return false;
            }
        }
        self.bymonth.iter().all(|m| (1..=12).contains(m))
    }

    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Appends an excluded instant, keeping the list free of duplicates.
    pub fn add_exdate(&mut self, exdate: DateTime<Utc>) {
        if !self.exdates.contains(&exdate) {
            self.exdates.push(exdate);
        }
    }
}

impl Display for RecurrenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = vec![format!("FREQ={}", self.freq)];
        parts.push(format!("INTERVAL={}", self.interval));
        if let Some(count) = self.count {
            parts.push(format!("COUNT={}", count));
        }
        if let Some(until) = &self.until {
            parts.push(format!("UNTIL={}", format_rule_ts(until)));
        }
        if !self.byday.is_empty() {
            parts.push(format!(
                "BYDAY={}",
                self.byday.iter().map(|d| d.to_string()).join(",")
            ));
        }
        if !self.bymonth.is_empty() {
            parts.push(format!(
                "BYMONTH={}",
                self.bymonth.iter().map(|m| m.to_string()).join(",")
            ));
        }
        if !self.exdates.is_empty() {
            parts.push(format!(
                "EXDATE={}",
                self.exdates.iter().map(format_rule_ts).join(",")
            ));
        }
        write!(f, "{}", parts.join(";"))
    }
}

impl FromStr for RecurrenceRule {
    type Err = InvalidRecurrenceRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rule = RecurrenceRule::default();
        let mut has_freq = false;

        for part in s.trim().trim_end_matches(';').split(';') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| InvalidRecurrenceRuleError::Malformed(part.to_string()))?;
            match key.to_uppercase().as_str() {
                "FREQ" => {
                    rule.freq = value.parse()?;
                    has_freq = true;
                }
                "INTERVAL" => {
                    let interval = value
                        .parse::<u32>()
                        .map_err(|_| InvalidRecurrenceRuleError::Malformed(part.to_string()))?;
                    rule.interval = interval.max(1);
                }
                "COUNT" => {
                    rule.count = Some(
                        value
                            .parse::<u32>()
                            .map_err(|_| InvalidRecurrenceRuleError::Malformed(part.to_string()))?,
                    );
                }
                "UNTIL" => rule.until = Some(parse_rule_ts(value)?),
                "BYDAY" => {
                    rule.byday = value
                        .split(',')
                        .map(|d| d.parse::<WeekDaySpec>())
                        .collect::<Result<Vec<_>, _>>()?;
                }
                "BYMONTH" => {
                    rule.bymonth = value
                        .split(',')
                        .map(|m| {
                            m.parse::<u32>().map_err(|_| {
                                InvalidRecurrenceRuleError::Malformed(part.to_string())
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                }
                "EXDATE" => {
                    rule.exdates = value
                        .split(',')
                        .map(parse_rule_ts)
                        .collect::<Result<Vec<_>, _>>()?;
                }
                // Unknown keys are carried by other producers; skip them.
                _ => {}
            }
        }

        if !has_freq {
            return Err(InvalidRecurrenceRuleError::Malformed(s.to_string()));
        }
        Ok(rule)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_valid_weekday_str_correctly() {
        assert_eq!(
            "mo".parse::<WeekDaySpec>().unwrap(),
            WeekDaySpec::new(Weekday::Mon)
        );
        assert_eq!(
            "su".parse::<WeekDaySpec>().unwrap(),
            WeekDaySpec::new(Weekday::Sun)
        );
        assert_eq!(
            "1mo".parse::<WeekDaySpec>().unwrap(),
            WeekDaySpec::new_nth(Weekday::Mon, 1).unwrap()
        );
        assert_eq!(
            "-2fr".parse::<WeekDaySpec>().unwrap(),
            WeekDaySpec::new_nth(Weekday::Fri, -2).unwrap()
        );
    }

    #[test]
    fn parses_invalid_weekday_str_correctly() {
        assert!("".parse::<WeekDaySpec>().is_err());
        assert!("-1".parse::<WeekDaySpec>().is_err());
        assert!("mon".parse::<WeekDaySpec>().is_err());
        assert!("0mo".parse::<WeekDaySpec>().is_err());
        assert!("1000mo".parse::<WeekDaySpec>().is_err());
    }

    #[test]
    fn canonical_string_round_trip() {
        let rule = RecurrenceRule {
            freq: Frequency::Weekly,
            interval: 2,
            count: Some(10),
            until: None,
            byday: vec![
                WeekDaySpec::new(Weekday::Mon),
                WeekDaySpec::new(Weekday::Wed),
            ],
            bymonth: vec![],
            exdates: vec![Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()],
        };
        let s = rule.to_string();
        assert_eq!(
            s,
            "FREQ=WEEKLY;INTERVAL=2;COUNT=10;BYDAY=MO,WE;EXDATE=20240115T090000"
        );
        assert_eq!(s.parse::<RecurrenceRule>().unwrap(), rule);
    }

    #[test]
    fn parses_until_with_trailing_z() {
        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20250101T120000Z".parse().unwrap();
        assert_eq!(
            rule.until,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn zero_interval_is_clamped() {
        let rule: RecurrenceRule = "FREQ=DAILY;INTERVAL=0".parse().unwrap();
        assert_eq!(rule.interval, 1);
    }

    #[test]
    fn rejects_rule_without_freq() {
        assert!("INTERVAL=2".parse::<RecurrenceRule>().is_err());
        assert!("gibberish".parse::<RecurrenceRule>().is_err());
    }

    #[test]
    fn validates_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut rule = RecurrenceRule::default();
        assert!(rule.is_valid(start));

        rule.count = Some(1000);
        assert!(!rule.is_valid(start));

        rule.count = None;
        rule.until = Some(start - chrono::Duration::days(1));
        assert!(!rule.is_valid(start));

        rule.until = None;
        rule.bymonth = vec![13];
        assert!(!rule.is_valid(start));
    }
}
