use super::backend::{FolderBackend, FolderInfo};
use almanac_domain::{
    CalendarId, Event, EventObjectId, RecurrenceExpander, Session, TimeSpan,
    DEFAULT_CALENDAR_COLOR,
};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub(crate) const COLOR_KEY: &str = "/shared/vendor/almanac/color";
pub(crate) const SHOWALARMS_KEY: &str = "/shared/vendor/almanac/showalarms";

/// Direct lookups of a synthetic occurrence id regenerate at most this far
/// past the series start. Occurrences further out are unreachable by id,
/// which bounds the cost of a miss.
const DIRECT_LOOKUP_YEARS: i64 = 10;

/// Calendar ids must survive URLs and report keys regardless of what
/// characters the folder path contains, so the id is the hex spelling of
/// the path. Folders are matched by re-encoding, never by decoding.
pub(crate) fn folder_id(name: &str) -> CalendarId {
    let mut encoded = String::with_capacity(name.len() * 2);
    for byte in name.bytes() {
        encoded.push_str(&format!("{:02x}", byte));
    }
    CalendarId::new(encoded)
}

/// One calendar folder of the document backend with its derived settings.
pub(crate) struct CalendarFolder {
    pub id: CalendarId,
    pub folder: String,
    pub name: String,
    pub color: String,
    pub readonly: bool,
    pub alarms: bool,
    pub subscribed: bool,
    backend: Arc<dyn FolderBackend>,
}

impl CalendarFolder {
    pub async fn open(
        backend: Arc<dyn FolderBackend>,
        info: &FolderInfo,
        session: &Session,
        root: &str,
    ) -> Self {
        let color = backend
            .get_metadata(&info.name, COLOR_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| DEFAULT_CALENDAR_COLOR.to_string());
        let owned = info.owner == session.username;
        let alarms = match backend
            .get_metadata(&info.name, SHOWALARMS_KEY)
            .await
            .ok()
            .flatten()
            .as_deref()
        {
            Some("true") => true,
            Some("false") => false,
            _ => owned,
        };
        let name = info
            .name
            .strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(&info.name)
            .to_string();

        Self {
            id: folder_id(&info.name),
            folder: info.name.clone(),
            name,
            color,
            readonly: !info.writable_by(&session.username),
            alarms,
            subscribed: info.subscribed,
            backend,
        }
    }

    pub fn as_calendar(&self) -> almanac_domain::Calendar {
        almanac_domain::Calendar {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            showalarms: self.alarms,
            readonly: self.readonly,
            subscribed: self.subscribed,
        }
    }

    /// Converts a raw document into its externally visible form.
    fn normalize(&self, mut event: Event) -> Event {
        event.id = EventObjectId::Uid(event.uid.clone());
        event.calendar_id = self.id.clone();
        // all-day documents may carry a degenerate end; give them the
        // placeholder hour
        if event.allday && event.end <= event.start {
            event.end = event.start + Duration::hours(1);
        }
        event
    }

    pub async fn get_event(&self, id: &str, tz: Tz, now: DateTime<Utc>) -> Option<Event> {
        if let Ok(Some(event)) = self.backend.find_object(&self.folder, id).await {
            return Some(self.normalize(event));
        }

        // not stored: maybe a synthetic occurrence id of a recurring master
        let synthetic = EventObjectId::Uid(id.to_string());
        let (master_uid, instance) = synthetic.split_instance_suffix()?;
        let master = self
            .backend
            .find_object(&self.folder, &master_uid)
            .await
            .ok()
            .flatten()?;
        let master = self.normalize(master);
        if master.recurrence.is_none() {
            return None;
        }
        let horizon = master.start + Duration::days(365 * DIRECT_LOOKUP_YEARS);
        let span = TimeSpan::new(master.start, horizon);
        self.expand_occurrences(&master, &span, Some(instance), tz, now)
            .into_iter()
            .next()
    }

    pub async fn list_events(
        &self,
        span: &TimeSpan,
        search: Option<&str>,
        virtual_occurrences: bool,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>> {
        let objects = self.backend.list_objects(&self.folder).await?;
        let mut events = Vec::new();
        for object in objects {
            let event = self.normalize(object);
            if let Some(search) = search {
                if !event.matches_query(search) {
                    continue;
                }
            }
            if event.occupies(span) {
                events.push(event.clone());
            }
            if event.is_recurring_master() && virtual_occurrences {
                events.extend(self.expand_occurrences(&event, span, None, tz, now));
            }
        }
        Ok(events)
    }

    /// Generates the virtual occurrences of a recurring master inside the
    /// window, or exactly the one with `target_instance` when given.
    pub fn expand_occurrences(
        &self,
        master: &Event,
        span: &TimeSpan,
        target_instance: Option<u32>,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let rule = match &master.recurrence {
            Some(rule) => rule,
            None => return Vec::new(),
        };
        let duration = master.duration();
        let expander = RecurrenceExpander::new(master.start, rule, tz, now);

        let mut occurrences = Vec::new();
        for (index, start) in expander.enumerate() {
            let instance = (index + 1) as u32;
            let end = start + duration;
            let in_window = start <= span.end() && end >= span.start();
            let is_target = target_instance == Some(instance);

            if in_window && target_instance.is_none() || is_target {
                let mut occurrence = master.clone();
                occurrence.id = EventObjectId::Virtual {
                    uid: master.uid.clone(),
                    instance,
                };
                occurrence.recurrence_id = Some(EventObjectId::Uid(master.uid.clone()));
                occurrence.instance = Some(instance);
                occurrence.start = start;
                occurrence.end = end;
                occurrences.push(occurrence);
                if is_target {
                    break;
                }
            } else if start > span.end() {
                break;
            }
        }
        occurrences
    }

    pub async fn insert_event(&self, event: &Event) -> anyhow::Result<()> {
        self.backend.save_object(&self.folder, event, None).await
    }

    pub async fn update_event(&self, event: &Event) -> anyhow::Result<()> {
        self.backend
            .save_object(&self.folder, event, Some(&event.uid))
            .await
    }

    pub async fn delete_event(&self, uid: &str, force: bool) -> anyhow::Result<bool> {
        self.backend.delete_object(&self.folder, uid, force).await
    }

    pub async fn restore_event(&self, uid: &str) -> anyhow::Result<bool> {
        self.backend.undelete_object(&self.folder, uid).await
    }

    pub async fn list_objects(&self) -> anyhow::Result<Vec<Event>> {
        let objects = self.backend.list_objects(&self.folder).await?;
        Ok(objects.into_iter().map(|o| self.normalize(o)).collect())
    }
}
