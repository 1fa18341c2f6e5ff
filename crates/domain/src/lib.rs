mod alarm;
mod attachment;
mod attendee;
mod calendar;
mod event;
mod expander;
mod session;
mod shared;
mod timespan;

pub use alarm::{AlarmAction, AlarmSpec, AlarmTrigger, OffsetUnit};
pub use attachment::Attachment;
pub use attendee::{
    parse_attendees, serialize_attendees, Attendee, AttendeeRole, AttendeeStatus,
};
pub use calendar::{Calendar, CalendarId, CalendarProps, Category, DEFAULT_CALENDAR_COLOR};
pub use event::{Event, FreeBusy, SaveMode, Sensitivity};
pub use expander::RecurrenceExpander;
pub use session::Session;
pub use shared::entity::EventObjectId;
pub use shared::recurrence::{Frequency, RecurrenceRule, WeekDaySpec};
pub use timespan::TimeSpan;
