pub mod document;
pub mod relational;

use almanac_domain::{
    Attachment, Calendar, CalendarId, CalendarProps, Category, Event, EventObjectId, Session,
    TimeSpan,
};
use chrono::{DateTime, Utc};

/// Feature flags of a backend, surfaced to the API layer so it can reject
/// operations a backend cannot honor instead of failing them downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub alarms: bool,
    pub attendees: bool,
    pub freebusy: bool,
    pub attachments: bool,
    pub undelete: bool,
    /// The category palette is fixed and cannot be mutated.
    pub categories_immutable: bool,
}

/// Capability-set interface over event storage. Exactly two implementations
/// exist — [`relational::RelationalStore`] and [`document::DocumentStore`] —
/// selected once at startup. Everything above this trait is backend
/// agnostic; in particular the edit-propagation logic only ever talks to
/// these operations.
///
/// Error convention: `anyhow::Result` carries backend I/O faults; expected
/// negative outcomes (not found, validation rejected, nothing deleted) are
/// `Ok(false)` / `Ok(None)` so callers can surface them as plain failures
/// without a retry.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    // calendars

    async fn list_calendars(&self, session: &Session) -> anyhow::Result<Vec<Calendar>>;
    async fn create_calendar(
        &self,
        session: &Session,
        props: &CalendarProps,
    ) -> anyhow::Result<Option<CalendarId>>;
    async fn edit_calendar(&self, session: &Session, props: &CalendarProps)
        -> anyhow::Result<bool>;
    async fn remove_calendar(&self, session: &Session, id: &CalendarId) -> anyhow::Result<bool>;
    async fn subscribe_calendar(
        &self,
        session: &Session,
        id: &CalendarId,
        active: bool,
    ) -> anyhow::Result<bool>;

    // events

    /// Persists a new event. Returns `None` when the referenced calendar is
    /// not owned (or not writable) by the current user.
    async fn new_event(
        &self,
        session: &Session,
        event: &Event,
    ) -> anyhow::Result<Option<EventObjectId>>;

    /// Raw record update; re-materializes occurrence rows where the backend
    /// stores them. Savemode dispatch happens above this call.
    async fn update_event(&self, session: &Session, event: &Event) -> anyhow::Result<bool>;

    /// Lookup by id (numeric or uid, backend depending). Synthetic
    /// occurrence ids resolve to a generated occurrence where supported.
    async fn get_event(&self, session: &Session, id: &EventObjectId) -> Option<Event>;

    /// Range-overlap query with optional case-insensitive substring search
    /// across title/location/description/categories/attendees, restricted
    /// to the given calendars (all of the user's calendars when `None`).
    async fn load_events(
        &self,
        session: &Session,
        span: &TimeSpan,
        query: Option<&str>,
        calendars: Option<&[CalendarId]>,
    ) -> anyhow::Result<Vec<Event>>;

    /// Removes one stored instance (a materialized occurrence row or a
    /// detached exception). Virtual occurrences have no stored object;
    /// deleting one is a no-op success, the series edit happens on the
    /// master.
    async fn delete_instance(&self, session: &Session, id: &EventObjectId)
        -> anyhow::Result<bool>;

    /// Removes stored occurrences of `master` starting at or after `from`.
    async fn delete_from(
        &self,
        session: &Session,
        master: &EventObjectId,
        from: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    /// Removes the master and every stored instance sharing its
    /// `recurrence_id`. `force` skips soft-delete where the backend would
    /// otherwise offer an undelete.
    async fn delete_series(
        &self,
        session: &Session,
        master: &EventObjectId,
        force: bool,
    ) -> anyhow::Result<bool>;

    /// Undoes a soft delete. `Ok(false)` on backends without the
    /// `undelete` capability.
    async fn restore_event(&self, session: &Session, id: &EventObjectId) -> anyhow::Result<bool>;

    // alarms

    /// Events whose notify-at has come due and whose end is still ahead,
    /// restricted to calendars with alarms enabled and deduplicated against
    /// dismissed state.
    async fn pending_alarms(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>>;

    /// Snooze (> 0 seconds) or permanently clear (0) a pending alarm.
    async fn dismiss_alarm(
        &self,
        session: &Session,
        event_id: &EventObjectId,
        snooze_seconds: i64,
    ) -> anyhow::Result<bool>;

    // attachments

    async fn list_attachments(
        &self,
        session: &Session,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Vec<Attachment>>;
    async fn get_attachment(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Attachment>>;
    async fn get_attachment_body(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Vec<u8>>>;

    // categories

    async fn list_categories(&self, session: &Session) -> anyhow::Result<Vec<Category>>;
    async fn add_category(&self, session: &Session, category: &Category) -> anyhow::Result<bool>;
    async fn replace_category(
        &self,
        session: &Session,
        old_name: &str,
        category: &Category,
    ) -> anyhow::Result<bool>;
    async fn remove_category(&self, session: &Session, name: &str) -> anyhow::Result<bool>;
}
