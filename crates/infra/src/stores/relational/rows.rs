use almanac_domain::{
    parse_attendees, AlarmSpec, Calendar, Event, EventObjectId, FreeBusy, RecurrenceRule,
    Sensitivity,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub(crate) struct CalendarRow {
    pub calendar_id: i64,
    pub name: String,
    pub color: String,
    pub showalarms: bool,
    pub subscribed: bool,
}

impl CalendarRow {
    pub fn into_calendar(self) -> Calendar {
        Calendar {
            id: self.calendar_id.into(),
            name: self.name,
            color: self.color,
            showalarms: self.showalarms,
            // SQL calendars are always owned by the querying user
            readonly: false,
            subscribed: self.subscribed,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub event_id: i64,
    pub calendar_id: i64,
    pub recurrence_id: i64,
    pub instance: i32,
    pub uid: String,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<String>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub categories: String,
    pub free_busy: i32,
    pub priority: i32,
    pub sensitivity: i32,
    pub attendees: Option<String>,
    pub alarms: Option<String>,
    #[allow(dead_code)]
    pub notifyat: Option<DateTime<Utc>>,
}

impl EventRow {
    pub fn into_event(self) -> Event {
        // a malformed rule or trigger string degrades to "not set"
        let recurrence = self
            .recurrence
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<RecurrenceRule>().ok());
        let alarm = self
            .alarms
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<AlarmSpec>().ok());

        Event {
            id: EventObjectId::Db(self.event_id),
            uid: self.uid,
            calendar_id: self.calendar_id.into(),
            recurrence_id: if self.recurrence_id != 0 {
                Some(EventObjectId::Db(self.recurrence_id))
            } else {
                None
            },
            instance: if self.instance > 0 {
                Some(self.instance as u32)
            } else {
                None
            },
            start: self.start_at,
            end: self.end_at,
            allday: self.all_day,
            title: self.title,
            description: self.description,
            location: self.location,
            categories: self.categories,
            free_busy: FreeBusy::from_code(self.free_busy),
            priority: self.priority.clamp(0, 2) as u8,
            sensitivity: Sensitivity::from_code(self.sensitivity),
            attendees: self
                .attendees
                .map(|block| parse_attendees(&block))
                .unwrap_or_default(),
            alarm,
            recurrence,
            attachments: Vec::new(),
            created: self.created,
            changed: self.changed,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct AttachmentRow {
    pub attachment_id: i64,
    pub filename: String,
    pub mimetype: String,
    pub size: i64,
}

impl AttachmentRow {
    pub fn into_attachment(self) -> almanac_domain::Attachment {
        almanac_domain::Attachment {
            id: self.attachment_id.to_string(),
            name: self.filename,
            mimetype: self.mimetype,
            size: self.size,
            data: None,
        }
    }
}
