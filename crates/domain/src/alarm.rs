use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{de::Visitor, Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// How an alarm is delivered. Carried alongside the trigger but never
/// affects timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmAction {
    Display,
    Email,
}

impl Display for AlarmAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Display => write!(f, "DISPLAY"),
            Self::Email => write!(f, "EMAIL"),
        }
    }
}

impl FromStr for AlarmAction {
    type Err = InvalidAlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DISPLAY" => Ok(Self::Display),
            "EMAIL" => Ok(Self::Email),
            _ => Err(InvalidAlarmError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetUnit {
    Minutes,
    Hours,
    Days,
}

impl OffsetUnit {
    fn seconds(&self) -> i64 {
        match self {
            Self::Minutes => 60,
            Self::Hours => 3600,
            Self::Days => 86400,
        }
    }

    fn symbol(&self) -> char {
        match self {
            Self::Minutes => 'M',
            Self::Hours => 'H',
            Self::Days => 'D',
        }
    }
}

/// The timing half of a trigger spec: either a signed offset whose sign
/// selects the reference point (before start / after end), or an absolute
/// instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmTrigger {
    Offset { amount: i64, unit: OffsetUnit },
    Absolute(DateTime<Utc>),
}

#[derive(Error, Debug)]
pub enum InvalidAlarmError {
    #[error("Unknown alarm action: {0}")]
    UnknownAction(String),
    #[error("Malformed alarm trigger: {0}")]
    Malformed(String),
}

/// An alarm specification in the compact `<±N><M|H|D>:<ACTION>` /
/// `@<unixtime>:<ACTION>` wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmSpec {
    pub trigger: AlarmTrigger,
    pub action: AlarmAction,
}

impl AlarmSpec {
    /// Absolute instant at which to notify the user, or `None` when the
    /// event already started: alarms are only armed for future events.
    /// A notify time that has itself passed is still returned; filtering
    /// those is the pending-alarms query's job at poll time.
    pub fn compute_notify_at(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if start <= now {
            return None;
        }
        match self.trigger {
            AlarmTrigger::Offset { amount, unit } => {
                let offset = Duration::seconds(amount * unit.seconds());
                // negative offsets lead the start, positive trail the end
                let reference = if amount > 0 { end } else { start };
                Some(reference + offset)
            }
            AlarmTrigger::Absolute(at) => Some(at),
        }
    }
}

impl Display for AlarmSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.trigger {
            AlarmTrigger::Offset { amount, unit } => {
                let sign = if amount >= 0 { "+" } else { "-" };
                write!(f, "{}{}{}:{}", sign, amount.abs(), unit.symbol(), self.action)
            }
            AlarmTrigger::Absolute(at) => write!(f, "@{}:{}", at.timestamp(), self.action),
        }
    }
}

impl FromStr for AlarmSpec {
    type Err = InvalidAlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InvalidAlarmError::Malformed(s.to_string());
        let (trigger_part, action_part) = s.split_once(':').ok_or_else(malformed)?;
        let action = action_part.parse::<AlarmAction>()?;

        if let Some(ts) = trigger_part.strip_prefix('@') {
            let unix = ts.parse::<i64>().map_err(|_| malformed())?;
            let at = Utc.timestamp_opt(unix, 0).single().ok_or_else(malformed)?;
            return Ok(Self {
                trigger: AlarmTrigger::Absolute(at),
                action,
            });
        }

        let mut chars = trigger_part.chars();
        let sign = match chars.next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Err(malformed()),
        };
        let rest: String = chars.collect();
        if rest.len() < 2 || !rest.is_ascii() {
            return Err(malformed());
        }
        let (digits, unit_char) = rest.split_at(rest.len() - 1);
        let amount = digits.parse::<i64>().map_err(|_| malformed())?;
        let unit = match unit_char {
            "M" | "m" => OffsetUnit::Minutes,
            "H" | "h" => OffsetUnit::Hours,
            "D" | "d" => OffsetUnit::Days,
            _ => return Err(malformed()),
        };

        Ok(Self {
            trigger: AlarmTrigger::Offset {
                amount: sign * amount,
                unit,
            },
            action,
        })
    }
}

impl Serialize for AlarmSpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AlarmSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AlarmSpecVisitor;

        impl<'de> Visitor<'de> for AlarmSpecVisitor {
            type Value = AlarmSpec;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("An alarm trigger spec string")
            }

            fn visit_str<E>(self, value: &str) -> Result<AlarmSpec, E>
            where
                E: serde::de::Error,
            {
                value
                    .parse::<AlarmSpec>()
                    .map_err(|_| E::custom(format!("Malformed alarm spec: {}", value)))
            }
        }

        deserializer.deserialize_str(AlarmSpecVisitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn minutes_before_start() {
        let spec: AlarmSpec = "-15M:DISPLAY".parse().unwrap();
        let start = utc(2024, 1, 1, 10, 0);
        let end = utc(2024, 1, 1, 11, 0);
        let now = utc(2024, 1, 1, 8, 0);
        assert_eq!(
            spec.compute_notify_at(start, end, now),
            Some(utc(2024, 1, 1, 9, 45))
        );
    }

    #[test]
    fn days_after_end() {
        let spec: AlarmSpec = "+1D:EMAIL".parse().unwrap();
        let start = utc(2024, 1, 1, 23, 0);
        let end = utc(2024, 1, 2, 0, 0);
        let now = utc(2024, 1, 1, 8, 0);
        assert_eq!(
            spec.compute_notify_at(start, end, now),
            Some(utc(2024, 1, 3, 0, 0))
        );
    }

    #[test]
    fn no_alarm_for_elapsed_event() {
        let spec: AlarmSpec = "-15M:DISPLAY".parse().unwrap();
        let start = utc(2024, 1, 1, 10, 0);
        let end = utc(2024, 1, 1, 11, 0);
        let now = utc(2024, 1, 1, 10, 0);
        assert_eq!(spec.compute_notify_at(start, end, now), None);
    }

    #[test]
    fn absolute_trigger() {
        let at = utc(2024, 6, 1, 12, 0);
        let spec: AlarmSpec = format!("@{}:EMAIL", at.timestamp()).parse().unwrap();
        assert_eq!(spec.trigger, AlarmTrigger::Absolute(at));
        let start = utc(2024, 6, 2, 9, 0);
        let end = utc(2024, 6, 2, 10, 0);
        let now = utc(2024, 5, 1, 0, 0);
        assert_eq!(spec.compute_notify_at(start, end, now), Some(at));
    }

    #[test]
    fn wire_round_trip() {
        for s in ["-15M:DISPLAY", "+1D:EMAIL", "-2H:EMAIL", "@1704067200:DISPLAY"] {
            let spec: AlarmSpec = s.parse().unwrap();
            assert_eq!(spec.to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_specs() {
        for s in ["", "15M:DISPLAY", "-15X:DISPLAY", "-M:DISPLAY", "-15M", "-15M:RING"] {
            assert!(s.parse::<AlarmSpec>().is_err(), "{} should not parse", s);
        }
    }
}
