use crate::{
    error::AlmanacError,
    event::EventForm,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{
    Event, EventObjectId, RecurrenceExpander, RecurrenceRule, SaveMode, Session,
};
use almanac_infra::AlmanacContext;
use almanac_utils::generate_uid;
use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    #[serde(flatten)]
    pub event: EventForm,
    #[serde(default)]
    pub savemode: Option<SaveMode>,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NotFound(event_id) => AlmanacError::NotFound(format!(
            "The event with id: {}, was not found.",
            event_id
        )),
        UseCaseErrors::NotRecurring => AlmanacError::BadClientData(
            "The targeted occurrence does not belong to a recurring event".into(),
        ),
        UseCaseErrors::InvalidRecurrenceRule => {
            AlmanacError::BadClientData("Invalid recurrence rule specified for the event".into())
        }
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn save_event_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let body = body.into_inner();
    let usecase = SaveEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        form: body.event,
        savemode: body.savemode.unwrap_or_default(),
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Ok().json(event))
        .map_err(handle_error)
}

/// The edit-propagation state machine.
///
/// An edit to occurrence O of recurring master M is dispatched on the
/// caller's savemode: `new` detaches the submitted data entirely, `current`
/// excludes O from the series and persists it standalone, `future` splits
/// the series at O, and `all` rewrites the master. Writes are issued
/// strictly in sequence; a failure aborts the remaining steps and surfaces
/// as a single failure (an already-committed earlier step stays committed).
#[derive(Debug)]
pub struct SaveEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub form: EventForm,
    pub savemode: SaveMode,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(EventObjectId),
    NotRecurring,
    InvalidRecurrenceRule,
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for SaveEventUseCase {
    type Response = Event;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "SaveEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let store = &ctx.store;
        let session = &self.session;

        if let Some(rule) = &self.form.recurrence {
            if !rule.is_valid(self.form.start) {
                return Err(UseCaseErrors::InvalidRecurrenceRule);
            }
        }

        let old = store
            .get_event(session, &self.event_id)
            .await
            .ok_or_else(|| UseCaseErrors::NotFound(self.event_id.clone()))?;

        // a plain event takes the submitted state verbatim; a rule arriving
        // with the form turns it into a recurring master on this same path.
        // Detached exceptions are independent records: edits to them never
        // reach their former master.
        if !old.is_part_of_series() || old.is_detached_exception() {
            let mut event = old.clone();
            self.form.overlay(&mut event);
            return self.persist_update(ctx, event).await;
        }

        let master = match &old.recurrence_id {
            Some(master_id) => store
                .get_event(session, master_id)
                .await
                .ok_or_else(|| UseCaseErrors::NotFound(master_id.clone()))?,
            None => old.clone(),
        };

        let mut edited = old.clone();
        self.form.overlay(&mut edited);

        // keep saved exceptions the client did not submit
        if let Some(rule) = &mut edited.recurrence {
            if rule.exdates.is_empty() {
                if let Some(master_rule) = &master.recurrence {
                    rule.exdates = master_rule.exdates.clone();
                }
            }
        }

        match self.savemode {
            SaveMode::New => {
                let mut event = edited;
                event.uid = generate_uid();
                event.id = EventObjectId::Uid(event.uid.clone());
                event.recurrence = None;
                event.recurrence_id = None;
                event.instance = None;
                self.persist_new(ctx, event).await
            }

            SaveMode::Current => {
                let mut master = master;
                match &mut master.recurrence {
                    Some(rule) => rule.add_exdate(old.start),
                    None => return Err(UseCaseErrors::NotRecurring),
                }
                if !store
                    .update_event(session, &master)
                    .await
                    .map_err(|_| UseCaseErrors::StorageError)?
                {
                    return Err(UseCaseErrors::StorageError);
                }

                // just this occurrence, decoupled from the series
                let mut detached = edited;
                detached.uid = generate_uid();
                detached.id = EventObjectId::Uid(detached.uid.clone());
                detached.recurrence = None;
                detached.recurrence_id = Some(master.id.clone());
                detached.instance = None;
                self.persist_new(ctx, detached).await
            }

            SaveMode::Future if old.id != master.id => {
                let original_rule = master
                    .recurrence
                    .clone()
                    .ok_or(UseCaseErrors::NotRecurring)?;

                // close the old series the day before this occurrence
                let mut truncated = master.clone();
                if let Some(rule) = &mut truncated.recurrence {
                    rule.until = Some(old.start - Duration::days(1));
                    rule.count = None;
                }
                if !store
                    .update_event(session, &truncated)
                    .await
                    .map_err(|_| UseCaseErrors::StorageError)?
                {
                    return Err(UseCaseErrors::StorageError);
                }

                // and continue as a new series from here on
                let mut series = edited;
                series.uid = generate_uid();
                series.id = EventObjectId::Uid(series.uid.clone());
                series.recurrence_id = None;
                series.instance = None;
                let mut rule = series.recurrence.take().unwrap_or(original_rule.clone());
                if let Some(count) = rule.count {
                    let consumed = consumed_instances(
                        &master,
                        &original_rule,
                        &old,
                        self.session.timezone,
                        ctx.sys.now(),
                    );
                    rule.count = Some(count.saturating_sub(consumed).max(1));
                }
                strip_derived_markers(&mut rule, master.start, self.session.timezone);
                series.recurrence = Some(rule);
                self.persist_new(ctx, series).await
            }

            // `future` on the master itself cannot differ from `all`
            _ => {
                let mut updated = edited;
                updated.id = master.id.clone();
                updated.uid = master.uid.clone();
                updated.recurrence_id = None;
                updated.instance = None;

                let tz = self.session.timezone;
                let old_local = old.start.with_timezone(&tz);
                let new_local = self.form.start.with_timezone(&tz);
                let old_duration = old.end - old.start;
                let new_duration = self.form.end - self.form.start;
                let same_date = old_local.date_naive() == new_local.date_naive();
                let same_time = old_local.time() == new_local.time();
                let changed = !same_date || !same_time || old_duration != new_duration;

                if changed && (same_date || old_duration == new_duration) {
                    // shifted or resized: keep the series anchored to the
                    // master's start and apply the delta there
                    updated.start = master.start + (self.form.start - old.start);
                    updated.end = updated.start + new_duration;
                    if let Some(rule) = &mut updated.recurrence {
                        strip_derived_markers(rule, master.start, tz);
                    }
                }

                self.persist_update(ctx, updated).await
            }
        }
    }
}

impl SaveEventUseCase {
    async fn persist_update(
        &self,
        ctx: &AlmanacContext,
        event: Event,
    ) -> Result<Event, UseCaseErrors> {
        match ctx.store.update_event(&self.session, &event).await {
            Ok(true) => Ok(event),
            _ => Err(UseCaseErrors::StorageError),
        }
    }

    async fn persist_new(
        &self,
        ctx: &AlmanacContext,
        mut event: Event,
    ) -> Result<Event, UseCaseErrors> {
        match ctx.store.new_event(&self.session, &event).await {
            Ok(Some(id)) => {
                event.id = id;
                Ok(event)
            }
            _ => Err(UseCaseErrors::StorageError),
        }
    }
}

/// Number of instances that remain with the truncated master: the master
/// itself plus every occurrence before the split point.
fn consumed_instances(
    master: &Event,
    rule: &RecurrenceRule,
    occurrence: &Event,
    tz: Tz,
    now: DateTime<Utc>,
) -> u32 {
    if let Some(instance) = occurrence.instance {
        return instance;
    }
    let mut consumed = 1;
    let mut expander = RecurrenceExpander::new(master.start, rule, tz, now);
    while let Some(start) = expander.next_start() {
        if start >= occurrence.start {
            break;
        }
        consumed += 1;
    }
    consumed
}

/// Drops rule parts that merely restate the series start (a lone plain
/// weekday, the start's own month) so the next expansion re-derives them
/// from the new start.
fn strip_derived_markers(rule: &mut RecurrenceRule, start: DateTime<Utc>, tz: Tz) {
    if rule.byday.len() == 1 && rule.byday[0].is_plain() {
        rule.byday.clear();
    }
    let start_month = start.with_timezone(&tz).month();
    if rule.bymonth.len() == 1 && rule.bymonth[0] == start_month {
        rule.bymonth.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::{CalendarId, Frequency, TimeSpan};
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn session() -> Session {
        Session::new(1, "jane", chrono_tz::UTC)
    }

    async fn context_with_daily_master(
        count: u32,
    ) -> (AlmanacContext, EventObjectId, CalendarId) {
        let now = utc(2024, 1, 1, 0, 0);
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = session();
        let calendar = ctx.store.list_calendars(&session).await.unwrap()[0]
            .id
            .clone();

        let start = utc(2024, 1, 1, 9, 0);
        let mut event = Event::new("master1", calendar.clone(), start, start + Duration::hours(1), now);
        event.title = "Standup".into();
        event.recurrence = Some(RecurrenceRule {
            freq: Frequency::Daily,
            count: Some(count),
            ..Default::default()
        });
        let id = ctx
            .store
            .new_event(&session, &event)
            .await
            .unwrap()
            .unwrap();
        (ctx, id, calendar)
    }

    async fn series_events(ctx: &AlmanacContext) -> Vec<Event> {
        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        let mut events = ctx
            .store
            .load_events(&session(), &span, None, None)
            .await
            .unwrap();
        events.sort_by_key(|e| e.start);
        events
    }

    fn form_for(event: &Event) -> EventForm {
        EventForm::from_event(event)
    }

    #[tokio::test]
    async fn current_mode_detaches_one_occurrence() {
        let (ctx, master_id, _) = context_with_daily_master(10).await;
        let events = series_events(&ctx).await;
        assert_eq!(events.len(), 10);

        // occurrence 3 of the series is the Jan 3 instance
        let occurrence = events
            .iter()
            .find(|e| e.start == utc(2024, 1, 3, 9, 0))
            .unwrap()
            .clone();

        let mut form = form_for(&occurrence);
        form.title = "Standup (moved)".into();
        form.start = utc(2024, 1, 3, 14, 0);
        form.end = utc(2024, 1, 3, 15, 0);

        let usecase = SaveEventUseCase {
            session: session(),
            event_id: occurrence.id.clone(),
            form,
            savemode: SaveMode::Current,
        };
        let detached = execute(usecase, &ctx).await.unwrap();
        assert!(detached.recurrence.is_none());
        assert_ne!(detached.uid, "master1");

        // the master carries the exclusion now
        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        let rule = master.recurrence.unwrap();
        assert_eq!(rule.exdates, vec![utc(2024, 1, 3, 9, 0)]);

        // series instances 1,2,4..10 are unchanged; exactly one standalone
        // event replaced occurrence 3
        let events = series_events(&ctx).await;
        let series: Vec<_> = events.iter().filter(|e| e.uid == "master1").collect();
        assert_eq!(series.len(), 9);
        assert!(series.iter().all(|e| e.start != utc(2024, 1, 3, 9, 0)));
        let detached: Vec<_> = events.iter().filter(|e| e.uid != "master1").collect();
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].start, utc(2024, 1, 3, 14, 0));
        assert_eq!(detached[0].title, "Standup (moved)");
    }

    #[tokio::test]
    async fn future_mode_splits_series_and_adjusts_count() {
        let (ctx, master_id, _) = context_with_daily_master(10).await;
        let events = series_events(&ctx).await;

        // instance 6 of the series: 2024-01-06
        let occurrence = events
            .iter()
            .find(|e| e.start == utc(2024, 1, 6, 9, 0))
            .unwrap()
            .clone();

        let mut form = form_for(&occurrence);
        form.title = "Standup v2".into();

        let usecase = SaveEventUseCase {
            session: session(),
            event_id: occurrence.id.clone(),
            form,
            savemode: SaveMode::Future,
        };
        let series = execute(usecase, &ctx).await.unwrap();

        // old master: UNTIL the day before the split, COUNT gone
        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        let master_rule = master.recurrence.unwrap();
        assert_eq!(master_rule.until, Some(utc(2024, 1, 5, 9, 0)));
        assert_eq!(master_rule.count, None);

        // new series: the remaining 5 instances from Jan 6 on
        let new_rule = series.recurrence.clone().unwrap();
        assert_eq!(new_rule.count, Some(5));
        assert_eq!(new_rule.until, None);
        assert_eq!(series.start, utc(2024, 1, 6, 9, 0));
        assert_eq!(series.title, "Standup v2");

        // ten instances total across the two series
        let events = series_events(&ctx).await;
        let old_instances = events.iter().filter(|e| e.uid == "master1").count();
        let new_instances = events.iter().filter(|e| e.uid == series.uid).count();
        assert_eq!(old_instances, 5);
        assert_eq!(new_instances, 5);
    }

    #[tokio::test]
    async fn new_mode_spawns_untouched_standalone() {
        let (ctx, master_id, _) = context_with_daily_master(5).await;
        let events = series_events(&ctx).await;
        let occurrence = events
            .iter()
            .find(|e| e.start == utc(2024, 1, 2, 9, 0))
            .unwrap()
            .clone();

        let mut form = form_for(&occurrence);
        form.title = "One-off".into();

        let usecase = SaveEventUseCase {
            session: session(),
            event_id: occurrence.id.clone(),
            form,
            savemode: SaveMode::New,
        };
        let standalone = execute(usecase, &ctx).await.unwrap();
        assert!(standalone.recurrence.is_none());
        assert!(standalone.recurrence_id.is_none());

        // the original series is untouched
        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        let rule = master.recurrence.unwrap();
        assert!(rule.exdates.is_empty());
        assert_eq!(rule.count, Some(5));
        assert_eq!(series_events(&ctx).await.len(), 6);
    }

    #[tokio::test]
    async fn all_mode_time_shift_stays_anchored_to_master() {
        let (ctx, master_id, _) = context_with_daily_master(5).await;
        let events = series_events(&ctx).await;

        // drag the Jan 3 occurrence one hour later (same date, same
        // duration): the whole series shifts relative to its master
        let occurrence = events
            .iter()
            .find(|e| e.start == utc(2024, 1, 3, 9, 0))
            .unwrap()
            .clone();

        let mut form = form_for(&occurrence);
        form.start = utc(2024, 1, 3, 10, 0);
        form.end = utc(2024, 1, 3, 11, 0);

        let usecase = SaveEventUseCase {
            session: session(),
            event_id: occurrence.id.clone(),
            form,
            savemode: SaveMode::All,
        };
        let updated = execute(usecase, &ctx).await.unwrap();
        assert_eq!(updated.start, utc(2024, 1, 1, 10, 0));
        assert_eq!(updated.end, utc(2024, 1, 1, 11, 0));

        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        assert_eq!(master.start, utc(2024, 1, 1, 10, 0));
    }

    #[tokio::test]
    async fn rejects_invalid_recurrence() {
        let (ctx, master_id, _) = context_with_daily_master(5).await;
        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();

        let mut form = form_for(&master);
        form.recurrence = Some(RecurrenceRule {
            count: Some(10_000),
            ..Default::default()
        });

        let usecase = SaveEventUseCase {
            session: session(),
            event_id: master_id,
            form,
            savemode: SaveMode::All,
        };
        assert!(matches!(
            execute(usecase, &ctx).await,
            Err(UseCaseErrors::InvalidRecurrenceRule)
        ));
    }

    #[tokio::test]
    async fn saving_master_twice_rematerializes_identically() {
        let (ctx, master_id, _) = context_with_daily_master(10).await;
        let before = series_events(&ctx).await;

        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        let usecase = SaveEventUseCase {
            session: session(),
            event_id: master_id,
            form: form_for(&master),
            savemode: SaveMode::All,
        };
        execute(usecase, &ctx).await.unwrap();

        let after = series_events(&ctx).await;
        assert_eq!(before.len(), after.len());
        let starts_before: Vec<_> = before.iter().map(|e| e.start).collect();
        let starts_after: Vec<_> = after.iter().map(|e| e.start).collect();
        assert_eq!(starts_before, starts_after);
    }
}
