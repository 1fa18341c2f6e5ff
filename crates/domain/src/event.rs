use crate::{
    alarm::AlarmSpec,
    attachment::Attachment,
    attendee::Attendee,
    calendar::CalendarId,
    shared::entity::EventObjectId,
    shared::recurrence::RecurrenceRule,
    timespan::TimeSpan,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Availability classification used for scheduling conflict display.
/// The discriminants are the relational backend's column codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreeBusy {
    Free,
    Busy,
    OutOfOffice,
    Tentative,
}

impl Default for FreeBusy {
    fn default() -> Self {
        Self::Busy
    }
}

impl FreeBusy {
    pub fn code(&self) -> i32 {
        match self {
            Self::Free => 0,
            Self::Busy => 1,
            Self::OutOfOffice => 2,
            Self::Tentative => 3,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Free,
            2 => Self::OutOfOffice,
            3 => Self::Tentative,
            _ => Self::Busy,
        }
    }

    pub fn parse_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "free" => Self::Free,
            "out-of-office" | "outofoffice" => Self::OutOfOffice,
            "tentative" => Self::Tentative,
            _ => Self::Busy,
        }
    }
}

impl Display for FreeBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Free => "free",
            Self::Busy => "busy",
            Self::OutOfOffice => "out-of-office",
            Self::Tentative => "tentative",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Public,
    Private,
    Confidential,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::Public
    }
}

impl Sensitivity {
    pub fn code(&self) -> i32 {
        match self {
            Self::Public => 0,
            Self::Private => 1,
            Self::Confidential => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Private,
            2 => Self::Confidential,
            _ => Self::Public,
        }
    }
}

/// Caller-supplied edit intent accompanying every mutation of a recurring
/// event: which part of the series the change applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    All,
    Current,
    Future,
    New,
}

impl Default for SaveMode {
    fn default() -> Self {
        Self::All
    }
}

impl FromStr for SaveMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "current" => Ok(Self::Current),
            "future" => Ok(Self::Future),
            "new" => Ok(Self::New),
            _ => Err(()),
        }
    }
}

/// A calendar event, either a stored record or a derived occurrence of a
/// recurring master.
///
/// Occurrences carry `recurrence_id` (the master's id) and `instance` (their
/// 1-based index in the series, the master itself being instance 1). The
/// serde projection doubles as the document backend's on-wire body and the
/// JSON shape handed to API clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventObjectId,
    pub uid: String,
    pub calendar_id: CalendarId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<EventObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<u32>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub allday: bool,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub free_busy: FreeBusy,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm: Option<AlarmSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
}

fn default_priority() -> u8 {
    1
}

impl Event {
    /// A blank event at the given time on the given calendar; the usual
    /// starting point before overlaying request fields.
    pub fn new(
        uid: impl Into<String>,
        calendar_id: CalendarId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventObjectId::Uid(String::new()),
            uid: uid.into(),
            calendar_id,
            recurrence_id: None,
            instance: None,
            start,
            end,
            allday: false,
            title: String::new(),
            description: String::new(),
            location: String::new(),
            categories: String::new(),
            free_busy: FreeBusy::default(),
            priority: default_priority(),
            sensitivity: Sensitivity::default(),
            attendees: Vec::new(),
            alarm: None,
            recurrence: None,
            attachments: Vec::new(),
            created: now,
            changed: now,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True for the canonical record a recurring series derives from.
    pub fn is_recurring_master(&self) -> bool {
        self.recurrence.is_some() && self.recurrence_id.is_none()
    }

    /// True for any event attached to a series: the master or an occurrence.
    pub fn is_part_of_series(&self) -> bool {
        self.recurrence.is_some() || self.recurrence_id.is_some()
    }

    /// A former occurrence saved standalone: it still points back at its
    /// master (so series deletion finds it) but no longer expands with the
    /// series, and edits to it stay local.
    pub fn is_detached_exception(&self) -> bool {
        self.recurrence.is_none() && self.recurrence_id.is_some() && self.instance.is_none()
    }

    pub fn occupies(&self, span: &TimeSpan) -> bool {
        self.start <= span.end() && self.end >= span.start()
    }

    /// Case-insensitive substring search across the descriptive fields,
    /// matching what the relational backend filters in SQL.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.title.to_lowercase().contains(&q)
            || self.location.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
            || self.categories.to_lowercase().contains(&q)
            || self
                .attendees
                .iter()
                .any(|a| a.name.to_lowercase().contains(&q) || a.email.to_lowercase().contains(&q))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> Event {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        Event::new(
            "abc123",
            CalendarId::new("1"),
            start,
            start + Duration::hours(1),
            start,
        )
    }

    #[test]
    fn free_busy_codes_round_trip() {
        for fb in [
            FreeBusy::Free,
            FreeBusy::Busy,
            FreeBusy::OutOfOffice,
            FreeBusy::Tentative,
        ] {
            assert_eq!(FreeBusy::from_code(fb.code()), fb);
        }
        assert_eq!(FreeBusy::parse_or_default("outofoffice"), FreeBusy::OutOfOffice);
        assert_eq!(FreeBusy::parse_or_default("nonsense"), FreeBusy::Busy);
    }

    #[test]
    fn series_classification() {
        let mut event = sample_event();
        assert!(!event.is_part_of_series());

        event.recurrence = Some(Default::default());
        assert!(event.is_recurring_master());

        event.recurrence = None;
        event.recurrence_id = Some(EventObjectId::Db(7));
        assert!(event.is_part_of_series());
        assert!(!event.is_recurring_master());
    }

    #[test]
    fn query_matches_attendees() {
        let mut event = sample_event();
        event.attendees.push(crate::attendee::Attendee {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            role: Default::default(),
            status: Default::default(),
        });
        assert!(event.matches_query("JANE"));
        assert!(!event.matches_query("bob"));
    }

    #[test]
    fn json_projection_round_trip() {
        let mut event = sample_event();
        event.alarm = Some("-15M:DISPLAY".parse().unwrap());
        event.recurrence = Some("FREQ=WEEKLY;INTERVAL=1".parse().unwrap());
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
