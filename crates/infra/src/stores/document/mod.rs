mod alarm_state;
mod backend;
mod folder;
mod imap;
mod inmemory;

pub use alarm_state::{AlarmState, AlarmStateRepo, InMemoryAlarmStateRepo, PostgresAlarmStateRepo};
pub use backend::{FolderBackend, FolderInfo};
pub use imap::ImapFolderBackend;
pub use inmemory::InMemoryFolderBackend;

use super::{Capabilities, EventStore};
use crate::{services::FreeBusyNotifier, system::ISys};
use almanac_domain::{
    Attachment, Attendee, AttendeeRole, AttendeeStatus, Calendar, CalendarId, CalendarProps,
    Category, Event, EventObjectId, Session, TimeSpan,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use folder::{folder_id, CalendarFolder, COLOR_KEY, SHOWALARMS_KEY};
use std::sync::{Arc, Mutex};

/// Alarm polling is rate-limited to one real scan per wall-clock slot of
/// this many seconds; scanning virtual occurrences a year ahead is too
/// expensive to run on every keep-alive.
const ALARM_POLL_SLOT_SECS: i64 = 300;

/// How far ahead the alarm scan looks for upcoming occurrences.
const ALARM_SCAN_DAYS: i64 = 365;

/// Document backend: calendars are folders on an object server, events are
/// one document each, and occurrences of recurring masters are generated
/// lazily at read time. Only detached exceptions exist as real objects.
pub struct DocumentStore {
    backend: Arc<dyn FolderBackend>,
    alarm_state: Arc<dyn AlarmStateRepo>,
    freebusy: FreeBusyNotifier,
    sys: Arc<dyn ISys>,
    root: String,
    last_alarm_slot: Mutex<i64>,
}

impl DocumentStore {
    pub fn new(
        backend: Arc<dyn FolderBackend>,
        alarm_state: Arc<dyn AlarmStateRepo>,
        freebusy: FreeBusyNotifier,
        sys: Arc<dyn ISys>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            alarm_state,
            freebusy,
            sys,
            root: root.into(),
            last_alarm_slot: Mutex::new(0),
        }
    }

    async fn read_calendars(&self, session: &Session) -> anyhow::Result<Vec<CalendarFolder>> {
        let infos = self.backend.list_folders().await?;
        let mut calendars = Vec::with_capacity(infos.len());
        for info in &infos {
            calendars
                .push(CalendarFolder::open(self.backend.clone(), info, session, &self.root).await);
        }
        Ok(calendars)
    }

    async fn find_calendar(
        &self,
        session: &Session,
        id: &CalendarId,
    ) -> anyhow::Result<Option<CalendarFolder>> {
        let calendars = self.read_calendars(session).await?;
        Ok(calendars.into_iter().find(|c| &c.id == id))
    }

    /// Locates an event by scanning the user's calendars, mirroring lookups
    /// that arrive without a calendar hint.
    async fn find_event(
        &self,
        session: &Session,
        id: &EventObjectId,
    ) -> Option<(CalendarFolder, Event)> {
        let raw_id = id.to_string();
        let now = self.sys.now();
        let calendars = self.read_calendars(session).await.ok()?;
        for calendar in calendars {
            if let Some(event) = calendar.get_event(&raw_id, session.timezone, now).await {
                return Some((calendar, event));
            }
        }
        None
    }

    fn validate_folder_name(&self, name: &str) -> bool {
        // '%', '*' and the hierarchy delimiter are problematic in
        // LIST/LSUB commands
        !name.is_empty()
            && name.len() <= 128
            && !name.contains('%')
            && !name.contains('*')
            && !name.contains('/')
    }

    /// Document bodies carry attachments inline; entries arriving without a
    /// content id get one before the document is written.
    fn assign_attachment_ids(event: &mut Event) {
        let mut next = event
            .attachments
            .iter()
            .filter(|a| !a.id.is_empty())
            .count();
        for attachment in &mut event.attachments {
            if attachment.id.is_empty() {
                next += 1;
                attachment.id = format!("att-{}", next);
            }
        }
    }

    fn prepare_for_save(&self, session: &Session, event: &Event) -> Event {
        let mut event = event.clone();
        event.id = EventObjectId::Uid(event.uid.clone());
        event.changed = self.sys.now();
        Self::assign_attachment_ids(&mut event);
        // the current user becomes the organizer when nobody else is named
        if event.attendees.is_empty() {
            event.attendees.push(Attendee {
                name: session.username.clone(),
                email: session.username.clone(),
                role: AttendeeRole::Organizer,
                status: AttendeeStatus::Accepted,
            });
        }
        event
    }
}

#[async_trait::async_trait]
impl EventStore for DocumentStore {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alarms: true,
            attendees: true,
            freebusy: true,
            attachments: true,
            undelete: self.backend.supports_undelete(),
            categories_immutable: true,
        }
    }

    async fn list_calendars(&self, session: &Session) -> anyhow::Result<Vec<Calendar>> {
        let mut calendars = self.read_calendars(session).await?;
        if !calendars.iter().any(|c| !c.readonly) {
            // no writable calendar yet: provision the default folder
            self.backend.create_folder(&self.root).await?;
            calendars = self.read_calendars(session).await?;
        }
        Ok(calendars.iter().map(CalendarFolder::as_calendar).collect())
    }

    async fn create_calendar(
        &self,
        session: &Session,
        props: &CalendarProps,
    ) -> anyhow::Result<Option<CalendarId>> {
        let name = match props.name.as_deref() {
            Some(name) => name,
            None => return Ok(None),
        };
        if !self.validate_folder_name(name) {
            return Ok(None);
        }
        let folder = format!("{}/{}", self.root, name);
        let existing = self.read_calendars(session).await?;
        if existing.iter().any(|c| c.folder == folder) {
            return Ok(None);
        }
        self.backend.create_folder(&folder).await?;
        if let Some(color) = props.color.as_deref() {
            self.backend.set_metadata(&folder, COLOR_KEY, color).await?;
        }
        if let Some(showalarms) = props.showalarms {
            self.backend
                .set_metadata(&folder, SHOWALARMS_KEY, if showalarms { "true" } else { "false" })
                .await?;
        }
        Ok(Some(folder_id(&folder)))
    }

    async fn edit_calendar(
        &self,
        session: &Session,
        props: &CalendarProps,
    ) -> anyhow::Result<bool> {
        let id = match props.id.as_ref() {
            Some(id) => id,
            None => return Ok(false),
        };
        let calendar = match self.find_calendar(session, id).await? {
            Some(calendar) => calendar,
            None => return Ok(false),
        };
        if calendar.readonly {
            return Ok(false);
        }

        let mut folder = calendar.folder.clone();
        if let Some(name) = props.name.as_deref() {
            if !self.validate_folder_name(name) {
                return Ok(false);
            }
            let renamed = if calendar.folder == self.root {
                // the default folder keeps its place
                calendar.folder.clone()
            } else {
                format!("{}/{}", self.root, name)
            };
            if renamed != calendar.folder {
                self.backend.rename_folder(&calendar.folder, &renamed).await?;
                folder = renamed;
            }
        }
        if let Some(color) = props.color.as_deref() {
            self.backend.set_metadata(&folder, COLOR_KEY, color).await?;
        }
        if let Some(showalarms) = props.showalarms {
            self.backend
                .set_metadata(&folder, SHOWALARMS_KEY, if showalarms { "true" } else { "false" })
                .await?;
        }
        Ok(true)
    }

    async fn remove_calendar(&self, session: &Session, id: &CalendarId) -> anyhow::Result<bool> {
        let calendar = match self.find_calendar(session, id).await? {
            Some(calendar) => calendar,
            None => return Ok(false),
        };
        if calendar.readonly {
            return Ok(false);
        }
        self.backend.delete_folder(&calendar.folder).await?;
        Ok(true)
    }

    async fn subscribe_calendar(
        &self,
        session: &Session,
        id: &CalendarId,
        active: bool,
    ) -> anyhow::Result<bool> {
        let calendar = match self.find_calendar(session, id).await? {
            Some(calendar) => calendar,
            None => return Ok(false),
        };
        self.backend.set_subscribed(&calendar.folder, active).await?;
        Ok(true)
    }

    async fn new_event(
        &self,
        session: &Session,
        event: &Event,
    ) -> anyhow::Result<Option<EventObjectId>> {
        let calendar = match self.find_calendar(session, &event.calendar_id).await? {
            Some(calendar) if !calendar.readonly => calendar,
            _ => return Ok(None),
        };
        let prepared = self.prepare_for_save(session, event);
        calendar.insert_event(&prepared).await?;
        self.freebusy.ping(&calendar.id);
        Ok(Some(EventObjectId::Uid(prepared.uid)))
    }

    async fn update_event(&self, session: &Session, event: &Event) -> anyhow::Result<bool> {
        let uid = match event.id.as_uid() {
            Some(uid) => uid.to_string(),
            None => return Ok(false),
        };
        let calendar = match self.find_calendar(session, &event.calendar_id).await? {
            Some(calendar) if !calendar.readonly => calendar,
            _ => return Ok(false),
        };
        if self.backend.find_object(&calendar.folder, &uid).await?.is_none() {
            return Ok(false);
        }
        let mut prepared = self.prepare_for_save(session, event);
        prepared.uid = uid.clone();
        prepared.id = EventObjectId::Uid(uid);
        calendar.update_event(&prepared).await?;
        self.freebusy.ping(&calendar.id);
        Ok(true)
    }

    async fn get_event(&self, session: &Session, id: &EventObjectId) -> Option<Event> {
        self.find_event(session, id).await.map(|(_, event)| event)
    }

    async fn load_events(
        &self,
        session: &Session,
        span: &TimeSpan,
        query: Option<&str>,
        calendars: Option<&[CalendarId]>,
    ) -> anyhow::Result<Vec<Event>> {
        let now = self.sys.now();
        let mut events = Vec::new();
        for calendar in self.read_calendars(session).await? {
            if let Some(wanted) = calendars {
                if !wanted.contains(&calendar.id) {
                    continue;
                }
            }
            events.extend(
                calendar
                    .list_events(span, query, true, session.timezone, now)
                    .await?,
            );
        }
        Ok(events)
    }

    async fn delete_instance(
        &self,
        session: &Session,
        id: &EventObjectId,
    ) -> anyhow::Result<bool> {
        match id {
            // virtual occurrences have no stored object; exclusion happens
            // through the master's EXDATE
            EventObjectId::Virtual { .. } => Ok(true),
            EventObjectId::Uid(uid) => {
                if let Some((calendar, _)) = self.find_event(session, id).await {
                    let deleted = calendar.delete_event(uid, false).await?;
                    if deleted {
                        self.freebusy.ping(&calendar.id);
                    }
                    Ok(deleted)
                } else {
                    Ok(false)
                }
            }
            EventObjectId::Db(_) => Ok(false),
        }
    }

    async fn delete_from(
        &self,
        _session: &Session,
        _master: &EventObjectId,
        _from: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        // nothing is materialized; the truncated rule on the master is the
        // cutoff
        Ok(true)
    }

    async fn delete_series(
        &self,
        session: &Session,
        master: &EventObjectId,
        force: bool,
    ) -> anyhow::Result<bool> {
        let uid = match master.as_uid() {
            Some(uid) => uid.to_string(),
            None => return Ok(false),
        };
        let (calendar, _) = match self.find_event(session, master).await {
            Some(found) => found,
            None => return Ok(false),
        };

        // detached exceptions point back at the master; they go with it
        let objects = calendar.list_objects().await?;
        for object in objects {
            let links_master = object
                .recurrence_id
                .as_ref()
                .and_then(|id| id.as_uid())
                .map(|master_uid| master_uid == uid)
                .unwrap_or(false);
            if links_master {
                calendar.delete_event(&object.uid, force).await?;
            }
        }

        let deleted = calendar.delete_event(&uid, force).await?;
        if deleted {
            self.freebusy.ping(&calendar.id);
        }
        Ok(deleted)
    }

    async fn restore_event(&self, session: &Session, id: &EventObjectId) -> anyhow::Result<bool> {
        if !self.backend.supports_undelete() {
            return Ok(false);
        }
        let uid = match id.as_uid() {
            Some(uid) => uid,
            None => return Ok(false),
        };
        for calendar in self.read_calendars(session).await? {
            if calendar.readonly {
                continue;
            }
            if calendar.restore_event(uid).await? {
                self.freebusy.ping(&calendar.id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn pending_alarms(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>> {
        let slot = now.timestamp() - now.timestamp() % ALARM_POLL_SLOT_SECS;
        {
            let mut last = self.last_alarm_slot.lock().unwrap();
            if *last == slot {
                // already scanned this slot
                return Ok(Vec::new());
            }
            *last = slot;
        }

        let poll_time = match Utc.timestamp_opt(slot + ALARM_POLL_SLOT_SECS, 0).single() {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };
        let span = TimeSpan::new(poll_time, poll_time + Duration::days(ALARM_SCAN_DAYS));

        let mut candidates: Vec<(Event, DateTime<Utc>)> = Vec::new();
        for calendar in self.read_calendars(session).await? {
            if !calendar.alarms {
                continue;
            }
            for event in calendar
                .list_events(&span, None, true, session.timezone, now)
                .await?
            {
                let alarm = match event.alarm {
                    Some(alarm) => alarm,
                    None => continue,
                };
                if let Some(notify) = alarm.compute_notify_at(event.start, event.end, now) {
                    if notify <= poll_time {
                        candidates.push((event, notify));
                    }
                }
            }
        }

        let ids: Vec<String> = candidates.iter().map(|(e, _)| e.id.to_string()).collect();
        let states = self.alarm_state.find_many(&ids).await?;

        let mut alarms = Vec::new();
        for (event, notify) in candidates {
            let state = states.iter().find(|s| s.event_id == event.id.to_string());
            if let Some(state) = state {
                if state.dismissed {
                    continue;
                }
                // snooze may have pushed the alarm time out
                if state.notifyat.map(|at| at > poll_time).unwrap_or(false) {
                    continue;
                }
            }
            debug_assert!(notify <= poll_time);
            alarms.push(event);
        }
        Ok(alarms)
    }

    async fn dismiss_alarm(
        &self,
        _session: &Session,
        event_id: &EventObjectId,
        snooze_seconds: i64,
    ) -> anyhow::Result<bool> {
        let state = AlarmState {
            event_id: event_id.to_string(),
            dismissed: snooze_seconds == 0,
            notifyat: if snooze_seconds > 0 {
                Some(self.sys.now() + Duration::seconds(snooze_seconds))
            } else {
                None
            },
        };
        self.alarm_state.upsert(&state).await?;
        Ok(true)
    }

    async fn list_attachments(
        &self,
        session: &Session,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Vec<Attachment>> {
        match self.find_event(session, event_id).await {
            Some((_, event)) => Ok(event
                .attachments
                .iter()
                .map(Attachment::metadata_only)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn get_attachment(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Attachment>> {
        Ok(self.find_event(session, event_id).await.and_then(|(_, event)| {
            event
                .attachments
                .iter()
                .find(|a| a.id == attachment_id)
                .map(Attachment::metadata_only)
        }))
    }

    async fn get_attachment_body(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.find_event(session, event_id).await.and_then(|(_, event)| {
            event
                .attachments
                .into_iter()
                .find(|a| a.id == attachment_id)
                .and_then(|a| a.data)
        }))
    }

    async fn list_categories(&self, _session: &Session) -> anyhow::Result<Vec<Category>> {
        // fixed palette defined by the storage format
        let fixed = [
            ("important", "cc0000"),
            ("business", "333333"),
            ("personal", "333333"),
            ("vacation", "333333"),
            ("must-attend", "333333"),
            ("travel-required", "333333"),
            ("needs-preparation", "333333"),
            ("birthday", "333333"),
            ("anniversary", "333333"),
            ("phone-call", "333333"),
        ];
        Ok(fixed
            .iter()
            .map(|(name, color)| Category {
                name: name.to_string(),
                color: color.to_string(),
            })
            .collect())
    }

    async fn add_category(&self, _session: &Session, _category: &Category) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn replace_category(
        &self,
        _session: &Session,
        _old_name: &str,
        _category: &Category,
    ) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn remove_category(&self, _session: &Session, _name: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::FixedSys;
    use almanac_domain::{Frequency, RecurrenceRule};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn session() -> Session {
        Session::new(1, "jane", chrono_tz::UTC)
    }

    fn store(now: DateTime<Utc>) -> DocumentStore {
        DocumentStore::new(
            Arc::new(InMemoryFolderBackend::new("jane")),
            Arc::new(InMemoryAlarmStateRepo::new()),
            FreeBusyNotifier::disabled(),
            Arc::new(FixedSys(now)),
            "Calendar",
        )
    }

    async fn default_calendar(store: &DocumentStore, session: &Session) -> CalendarId {
        store.list_calendars(session).await.unwrap()[0].id.clone()
    }

    fn event_at(uid: &str, calendar: CalendarId, start: DateTime<Utc>) -> Event {
        let mut event = Event::new(uid, calendar, start, start + Duration::hours(1), start);
        event.title = uid.to_string();
        event
    }

    #[tokio::test]
    async fn provisions_default_calendar() {
        let now = utc(2024, 1, 1, 0, 0);
        let store = store(now);
        let calendars = store.list_calendars(&session()).await.unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "Calendar");
        assert!(!calendars[0].readonly);
    }

    #[tokio::test]
    async fn lists_virtual_occurrences_with_synthetic_ids() {
        let now = utc(2024, 1, 1, 0, 0);
        let store = store(now);
        let session = session();
        let calendar = default_calendar(&store, &session).await;

        let mut event = event_at("abc", calendar, utc(2024, 1, 1, 9, 0));
        event.recurrence = Some(RecurrenceRule {
            freq: Frequency::Daily,
            count: Some(5),
            ..Default::default()
        });
        store.new_event(&session, &event).await.unwrap().unwrap();

        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 1, 10, 0, 0));
        let mut events = store
            .load_events(&session, &span, None, None)
            .await
            .unwrap();
        events.sort_by_key(|e| e.start);

        assert_eq!(events.len(), 5);
        assert_eq!(events[0].id, EventObjectId::Uid("abc".into()));
        assert_eq!(
            events[1].id,
            EventObjectId::Virtual {
                uid: "abc".into(),
                instance: 1
            }
        );
        assert_eq!(events[1].start, utc(2024, 1, 2, 9, 0));
        assert_eq!(
            events[1].recurrence_id,
            Some(EventObjectId::Uid("abc".into()))
        );
    }

    #[tokio::test]
    async fn direct_lookup_of_synthetic_id() {
        let now = utc(2024, 1, 1, 0, 0);
        let store = store(now);
        let session = session();
        let calendar = default_calendar(&store, &session).await;

        let mut event = event_at("abc", calendar, utc(2024, 1, 1, 9, 0));
        event.recurrence = Some(RecurrenceRule {
            freq: Frequency::Daily,
            count: Some(10),
            ..Default::default()
        });
        store.new_event(&session, &event).await.unwrap().unwrap();

        let occurrence = store
            .get_event(&session, &EventObjectId::parse("abc-3"))
            .await
            .unwrap();
        assert_eq!(occurrence.instance, Some(3));
        assert_eq!(occurrence.start, utc(2024, 1, 4, 9, 0));
    }

    #[tokio::test]
    async fn soft_delete_and_restore() {
        let now = utc(2024, 1, 1, 0, 0);
        let store = store(now);
        let session = session();
        let calendar = default_calendar(&store, &session).await;

        let event = event_at("abc", calendar, utc(2024, 1, 2, 9, 0));
        store.new_event(&session, &event).await.unwrap().unwrap();

        let id = EventObjectId::Uid("abc".into());
        assert!(store.delete_series(&session, &id, false).await.unwrap());
        assert!(store.get_event(&session, &id).await.is_none());

        assert!(store.restore_event(&session, &id).await.unwrap());
        assert!(store.get_event(&session, &id).await.is_some());
    }

    #[tokio::test]
    async fn alarm_poll_is_rate_limited_per_slot() {
        let now = utc(2024, 1, 1, 10, 0);
        let store = store(now);
        let session = session();
        let calendar = default_calendar(&store, &session).await;

        let mut event = event_at("abc", calendar, now + Duration::minutes(10));
        event.alarm = Some("-15M:DISPLAY".parse().unwrap());
        store.new_event(&session, &event).await.unwrap().unwrap();

        let first = store.pending_alarms(&session, now).await.unwrap();
        assert_eq!(first.len(), 1);

        // same 5-minute slot: the scan is gated off
        let again = store
            .pending_alarms(&session, now + Duration::seconds(30))
            .await
            .unwrap();
        assert!(again.is_empty());

        // dismissed alarms stay quiet in later slots
        store
            .dismiss_alarm(&session, &first[0].id, 0)
            .await
            .unwrap();
        let later = store
            .pending_alarms(&session, now + Duration::seconds(600))
            .await
            .unwrap();
        assert!(later.is_empty());
    }
}
