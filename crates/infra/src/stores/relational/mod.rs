mod rows;

use super::{Capabilities, EventStore};
use crate::system::ISys;
use almanac_domain::{
    serialize_attendees, Attachment, Calendar, CalendarId, CalendarProps, Category, Event,
    EventObjectId, RecurrenceExpander, Session, TimeSpan, DEFAULT_CALENDAR_COLOR,
};
use chrono::{DateTime, Duration, Utc};
use rows::{AttachmentRow, CalendarRow, EventRow};
use sqlx::{PgPool, QueryBuilder, Row};
use std::sync::Arc;
use tracing::warn;

/// SQL backend: one row per event, with occurrences of a recurring master
/// eagerly materialized as additional rows sharing the master's
/// `recurrence_id`. Materialized rows are deleted and regenerated on every
/// master write; detached exceptions keep `instance = 0` and survive
/// regeneration.
pub struct RelationalStore {
    pool: PgPool,
    sys: Arc<dyn ISys>,
}

impl RelationalStore {
    pub fn new(pool: PgPool, sys: Arc<dyn ISys>) -> Self {
        Self { pool, sys }
    }

    async fn owns_calendar(&self, session: &Session, calendar_id: i64) -> anyhow::Result<bool> {
        let found = sqlx::query(
            "SELECT calendar_id FROM calendars WHERE calendar_id = $1 AND user_id = $2",
        )
        .bind(calendar_id)
        .bind(session.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn insert_event_row(
        &self,
        event: &Event,
        recurrence_id: i64,
        instance: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        calendar_id: i64,
    ) -> anyhow::Result<i64> {
        let now = self.sys.now();
        let notifyat = event
            .alarm
            .and_then(|alarm| alarm.compute_notify_at(start, end, now));
        let event_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events(
                calendar_id, recurrence_id, instance, uid, created, changed,
                start_at, end_at, all_day, recurrence, title, description,
                location, categories, free_busy, priority, sensitivity,
                attendees, alarms, notifyat)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                   $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING event_id
            "#,
        )
        .bind(calendar_id)
        .bind(recurrence_id)
        .bind(instance)
        .bind(&event.uid)
        .bind(now)
        .bind(now)
        .bind(start)
        .bind(end)
        .bind(event.allday)
        .bind(event.recurrence.as_ref().map(|r| r.to_string()))
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(&event.categories)
        .bind(event.free_busy.code())
        .bind(event.priority as i32)
        .bind(event.sensitivity.code())
        .bind(serialize_attendees(&event.attendees))
        .bind(event.alarm.map(|a| a.to_string()))
        .bind(notifyat)
        .fetch_one(&self.pool)
        .await?;
        Ok(event_id)
    }

    /// Replaces the materialized occurrence rows of a recurring master.
    /// Rows with `instance = 0` (detached exceptions) are left alone.
    async fn update_recurring(
        &self,
        session: &Session,
        master: &Event,
        master_id: i64,
        calendar_id: i64,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM events WHERE recurrence_id = $1 AND instance > 0")
            .bind(master_id)
            .execute(&self.pool)
            .await?;

        let rule = match &master.recurrence {
            Some(rule) => rule,
            None => return Ok(()),
        };

        let now = self.sys.now();
        let duration = master.duration();
        let expander = RecurrenceExpander::new(master.start, rule, session.timezone, now);
        let mut instance = 0i32;
        for occurrence_start in expander {
            instance += 1;
            self.insert_event_row(
                master,
                master_id,
                instance,
                occurrence_start,
                occurrence_start + duration,
                calendar_id,
            )
            .await?;
        }
        Ok(())
    }

    async fn add_attachments(&self, event: &Event, event_id: i64) -> anyhow::Result<()> {
        for attachment in &event.attachments {
            let data = match &attachment.data {
                Some(data) => data,
                // entries without content are existing attachments
                None => continue,
            };
            sqlx::query(
                r#"
                INSERT INTO attachments(event_id, filename, mimetype, size, data)
                VALUES($1, $2, $3, $4, $5)
                "#,
            )
            .bind(event_id)
            .bind(&attachment.name)
            .bind(&attachment.mimetype)
            .bind(data.len() as i64)
            .bind(data.as_slice())
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn find_row(&self, session: &Session, id: &EventObjectId) -> Option<EventRow> {
        let result = match id {
            EventObjectId::Db(event_id) => {
                sqlx::query_as::<_, EventRow>(
                    r#"
                    SELECT e.* FROM events AS e
                    WHERE e.event_id = $1
                    AND e.calendar_id IN
                        (SELECT calendar_id FROM calendars WHERE user_id = $2)
                    "#,
                )
                .bind(event_id)
                .bind(session.user_id)
                .fetch_optional(&self.pool)
                .await
            }
            EventObjectId::Uid(uid) => {
                // several rows share a uid; prefer the master over its
                // materialized occurrences
                sqlx::query_as::<_, EventRow>(
                    r#"
                    SELECT e.* FROM events AS e
                    WHERE e.uid = $1
                    AND e.calendar_id IN
                        (SELECT calendar_id FROM calendars WHERE user_id = $2)
                    ORDER BY e.recurrence_id ASC, e.event_id ASC
                    LIMIT 1
                    "#,
                )
                .bind(uid)
                .bind(session.user_id)
                .fetch_optional(&self.pool)
                .await
            }
            EventObjectId::Virtual { .. } => Ok(None),
        };
        match result {
            Ok(row) => row,
            Err(e) => {
                warn!("event lookup failed: {:?}", e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl EventStore for RelationalStore {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            alarms: true,
            attendees: true,
            freebusy: false,
            attachments: true,
            undelete: false,
            categories_immutable: false,
        }
    }

    async fn list_calendars(&self, session: &Session) -> anyhow::Result<Vec<Calendar>> {
        let rows = sqlx::query_as::<_, CalendarRow>(
            "SELECT * FROM calendars WHERE user_id = $1 ORDER BY name",
        )
        .bind(session.user_id)
        .fetch_all(&self.pool)
        .await?;

        if !rows.is_empty() {
            return Ok(rows.into_iter().map(CalendarRow::into_calendar).collect());
        }

        // first contact: give the user a calendar to save into
        let props = CalendarProps {
            name: Some("Default".into()),
            color: Some(DEFAULT_CALENDAR_COLOR.into()),
            showalarms: Some(true),
            ..Default::default()
        };
        self.create_calendar(session, &props).await?;
        let rows = sqlx::query_as::<_, CalendarRow>(
            "SELECT * FROM calendars WHERE user_id = $1 ORDER BY name",
        )
        .bind(session.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CalendarRow::into_calendar).collect())
    }

    async fn create_calendar(
        &self,
        session: &Session,
        props: &CalendarProps,
    ) -> anyhow::Result<Option<CalendarId>> {
        let name = match props.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };
        let calendar_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO calendars(user_id, name, color, showalarms, subscribed)
            VALUES($1, $2, $3, $4, TRUE)
            RETURNING calendar_id
            "#,
        )
        .bind(session.user_id)
        .bind(name)
        .bind(props.color.as_deref().unwrap_or(DEFAULT_CALENDAR_COLOR))
        .bind(props.showalarms.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(calendar_id.into()))
    }

    async fn edit_calendar(
        &self,
        session: &Session,
        props: &CalendarProps,
    ) -> anyhow::Result<bool> {
        let calendar_id = match props.id.as_ref().and_then(|id| id.as_db_id()) {
            Some(id) => id,
            None => return Ok(false),
        };
        let result = sqlx::query(
            r#"
            UPDATE calendars SET
                name = COALESCE($3, name),
                color = COALESCE($4, color),
                showalarms = COALESCE($5, showalarms)
            WHERE calendar_id = $1 AND user_id = $2
            "#,
        )
        .bind(calendar_id)
        .bind(session.user_id)
        .bind(props.name.as_deref())
        .bind(props.color.as_deref())
        .bind(props.showalarms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_calendar(&self, session: &Session, id: &CalendarId) -> anyhow::Result<bool> {
        let calendar_id = match id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        // events and attachments go with it by foreign key cascade
        let result = sqlx::query("DELETE FROM calendars WHERE calendar_id = $1 AND user_id = $2")
            .bind(calendar_id)
            .bind(session.user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn subscribe_calendar(
        &self,
        session: &Session,
        id: &CalendarId,
        active: bool,
    ) -> anyhow::Result<bool> {
        let calendar_id = match id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        let result = sqlx::query(
            "UPDATE calendars SET subscribed = $3 WHERE calendar_id = $1 AND user_id = $2",
        )
        .bind(calendar_id)
        .bind(session.user_id)
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn new_event(
        &self,
        session: &Session,
        event: &Event,
    ) -> anyhow::Result<Option<EventObjectId>> {
        let calendar_id = match event.calendar_id.as_db_id() {
            Some(id) => id,
            None => return Ok(None),
        };
        if !self.owns_calendar(session, calendar_id).await? {
            return Ok(None);
        }

        let recurrence_id = event
            .recurrence_id
            .as_ref()
            .and_then(|id| id.as_db_id())
            .unwrap_or(0);
        let event_id = self
            .insert_event_row(event, recurrence_id, 0, event.start, event.end, calendar_id)
            .await?;
        self.add_attachments(event, event_id).await?;

        if event.recurrence.is_some() {
            self.update_recurring(session, event, event_id, calendar_id)
                .await?;
        }
        Ok(Some(EventObjectId::Db(event_id)))
    }

    async fn update_event(&self, session: &Session, event: &Event) -> anyhow::Result<bool> {
        let event_id = match event.id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        let calendar_id = match event.calendar_id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        if !self.owns_calendar(session, calendar_id).await? {
            return Ok(false);
        }

        let now = self.sys.now();
        let notifyat = event
            .alarm
            .and_then(|alarm| alarm.compute_notify_at(event.start, event.end, now));
        let result = sqlx::query(
            r#"
            UPDATE events SET
                calendar_id = $3, changed = $4, start_at = $5, end_at = $6,
                all_day = $7, recurrence = $8, title = $9, description = $10,
                location = $11, categories = $12, free_busy = $13,
                priority = $14, sensitivity = $15, attendees = $16,
                alarms = $17, notifyat = $18,
                recurrence_id = $19, instance = $20
            WHERE event_id = $1
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $2)
            "#,
        )
        .bind(event_id)
        .bind(session.user_id)
        .bind(calendar_id)
        .bind(now)
        .bind(event.start)
        .bind(event.end)
        .bind(event.allday)
        .bind(event.recurrence.as_ref().map(|r| r.to_string()))
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(&event.categories)
        .bind(event.free_busy.code())
        .bind(event.priority as i32)
        .bind(event.sensitivity.code())
        .bind(serialize_attendees(&event.attendees))
        .bind(event.alarm.map(|a| a.to_string()))
        .bind(notifyat)
        .bind(
            event
                .recurrence_id
                .as_ref()
                .and_then(|id| id.as_db_id())
                .unwrap_or(0),
        )
        .bind(event.instance.unwrap_or(0) as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.add_attachments(event, event_id).await?;
        self.update_recurring(session, event, event_id, calendar_id)
            .await?;
        Ok(true)
    }

    async fn get_event(&self, session: &Session, id: &EventObjectId) -> Option<Event> {
        let row = self.find_row(session, id).await?;
        let mut event = row.into_event();
        if let Ok(attachments) = self.list_attachments(session, &event.id).await {
            event.attachments = attachments;
        }
        Some(event)
    }

    async fn load_events(
        &self,
        session: &Session,
        span: &TimeSpan,
        query: Option<&str>,
        calendars: Option<&[CalendarId]>,
    ) -> anyhow::Result<Vec<Event>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT e.* FROM events AS e \
             WHERE e.calendar_id IN \
             (SELECT c.calendar_id FROM calendars AS c WHERE c.user_id = ",
        );
        qb.push_bind(session.user_id);
        if let Some(calendars) = calendars {
            let ids: Vec<i64> = calendars.iter().filter_map(|c| c.as_db_id()).collect();
            qb.push(" AND c.calendar_id = ANY(");
            qb.push_bind(ids);
            qb.push(")");
        }
        qb.push(") AND e.start_at <= ");
        qb.push_bind(span.end());
        qb.push(" AND e.end_at >= ");
        qb.push_bind(span.start());
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", query);
            qb.push(" AND (e.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.location ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.categories ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.attendees ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        qb.push(" ORDER BY e.start_at");

        let rows: Vec<EventRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    async fn delete_instance(
        &self,
        session: &Session,
        id: &EventObjectId,
    ) -> anyhow::Result<bool> {
        let event_id = match id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        let result = sqlx::query(
            r#"
            DELETE FROM events
            WHERE event_id = $1
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $2)
            "#,
        )
        .bind(event_id)
        .bind(session.user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_from(
        &self,
        session: &Session,
        master: &EventObjectId,
        from: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let master_id = match master.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        sqlx::query(
            r#"
            DELETE FROM events
            WHERE recurrence_id = $1 AND start_at >= $2
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $3)
            "#,
        )
        .bind(master_id)
        .bind(from)
        .bind(session.user_id)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn delete_series(
        &self,
        session: &Session,
        master: &EventObjectId,
        _force: bool,
    ) -> anyhow::Result<bool> {
        let master_id = match master.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        // irreversible here; only the document backend soft-deletes
        let result = sqlx::query(
            r#"
            DELETE FROM events
            WHERE (event_id = $1 OR recurrence_id = $1)
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $2)
            "#,
        )
        .bind(master_id)
        .bind(session.user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_event(&self, _session: &Session, _id: &EventObjectId) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn pending_alarms(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT e.* FROM events AS e
            WHERE e.calendar_id IN
                (SELECT calendar_id FROM calendars WHERE user_id = $1 AND showalarms)
            AND e.notifyat <= $2 AND e.end_at > $2
            "#,
        )
        .bind(session.user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    async fn dismiss_alarm(
        &self,
        session: &Session,
        event_id: &EventObjectId,
        snooze_seconds: i64,
    ) -> anyhow::Result<bool> {
        let event_id = match event_id.as_db_id() {
            Some(id) => id,
            None => return Ok(false),
        };
        let now = self.sys.now();
        let notifyat = if snooze_seconds > 0 {
            Some(now + Duration::seconds(snooze_seconds))
        } else {
            None
        };
        let result = sqlx::query(
            r#"
            UPDATE events SET changed = $3, notifyat = $4
            WHERE event_id = $1
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $2)
            "#,
        )
        .bind(event_id)
        .bind(session.user_id)
        .bind(now)
        .bind(notifyat)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_attachments(
        &self,
        session: &Session,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Vec<Attachment>> {
        let event_id = match event_id.as_db_id() {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        // occurrence rows expose the master's attachments
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT a.attachment_id, a.filename, a.mimetype, a.size
            FROM attachments AS a
            WHERE a.event_id IN (
                SELECT CASE WHEN e.recurrence_id > 0 THEN e.recurrence_id
                            ELSE e.event_id END
                FROM events AS e
                WHERE e.event_id = $1
                AND e.calendar_id IN
                    (SELECT calendar_id FROM calendars WHERE user_id = $2)
            )
            ORDER BY a.filename
            "#,
        )
        .bind(event_id)
        .bind(session.user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(AttachmentRow::into_attachment)
            .collect())
    }

    async fn get_attachment(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Attachment>> {
        let attachments = self.list_attachments(session, event_id).await?;
        Ok(attachments.into_iter().find(|a| a.id == attachment_id))
    }

    async fn get_attachment_body(
        &self,
        session: &Session,
        attachment_id: &str,
        event_id: &EventObjectId,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let attachment_id: i64 = match attachment_id.parse() {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        let event_id = match event_id.as_db_id() {
            Some(id) => id,
            None => return Ok(None),
        };
        let row = sqlx::query(
            r#"
            SELECT a.data FROM attachments AS a
            WHERE a.attachment_id = $1
            AND a.event_id IN (
                SELECT CASE WHEN e.recurrence_id > 0 THEN e.recurrence_id
                            ELSE e.event_id END
                FROM events AS e
                WHERE e.event_id = $2
                AND e.calendar_id IN
                    (SELECT calendar_id FROM calendars WHERE user_id = $3)
            )
            "#,
        )
        .bind(attachment_id)
        .bind(event_id)
        .bind(session.user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("data")))
    }

    async fn list_categories(&self, session: &Session) -> anyhow::Result<Vec<Category>> {
        let rows =
            sqlx::query("SELECT name, color FROM categories WHERE user_id = $1 ORDER BY name")
                .bind(session.user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|r| Category {
                name: r.get("name"),
                color: r.get("color"),
            })
            .collect())
    }

    async fn add_category(&self, session: &Session, category: &Category) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO categories(user_id, name, color)
            VALUES($1, $2, $3)
            ON CONFLICT (user_id, name) DO UPDATE SET color = EXCLUDED.color
            "#,
        )
        .bind(session.user_id)
        .bind(&category.name)
        .bind(&category.color)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_category(
        &self,
        session: &Session,
        old_name: &str,
        category: &Category,
    ) -> anyhow::Result<bool> {
        sqlx::query("DELETE FROM categories WHERE user_id = $1 AND name = $2")
            .bind(session.user_id)
            .bind(old_name)
            .execute(&self.pool)
            .await?;
        self.add_category(session, category).await?;
        // re-label events carrying the old category
        sqlx::query(
            r#"
            UPDATE events SET categories = $3
            WHERE categories = $2
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $1)
            "#,
        )
        .bind(session.user_id)
        .bind(old_name)
        .bind(&category.name)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn remove_category(&self, session: &Session, name: &str) -> anyhow::Result<bool> {
        sqlx::query("DELETE FROM categories WHERE user_id = $1 AND name = $2")
            .bind(session.user_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        sqlx::query(
            r#"
            UPDATE events SET categories = ''
            WHERE categories = $2
            AND calendar_id IN (SELECT calendar_id FROM calendars WHERE user_id = $1)
            "#,
        )
        .bind(session.user_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }
}
