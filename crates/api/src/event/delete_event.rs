use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{EventObjectId, SaveMode, Session};
use almanac_infra::AlmanacContext;
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub savemode: Option<SaveMode>,
    #[serde(default)]
    pub force: bool,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NotFound(event_id) => AlmanacError::NotFound(format!(
            "The event with id: {}, was not found.",
            event_id
        )),
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn delete_event_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    query: web::Query<QueryParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = DeleteEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        savemode: query.savemode.unwrap_or_default(),
        force: query.force,
    };

    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(handle_error)
}

/// Deletion follows the same savemode dispatch as editing: `current`
/// excludes one instance, `future` truncates the series, `all` removes the
/// master and everything attached to it (softly, where the backend can
/// undelete and `force` was not requested).
#[derive(Debug)]
pub struct DeleteEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub savemode: SaveMode,
    pub force: bool,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(EventObjectId),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for DeleteEventUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "DeleteEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let store = &ctx.store;
        let session = &self.session;

        let event = store
            .get_event(session, &self.event_id)
            .await
            .ok_or_else(|| UseCaseErrors::NotFound(self.event_id.clone()))?;

        // standalone events and detached exceptions go away on their own;
        // nothing propagates to a series
        if !event.is_part_of_series() || event.is_detached_exception() {
            return match store.delete_series(session, &event.id, self.force).await {
                Ok(true) => Ok(()),
                _ => Err(UseCaseErrors::StorageError),
            };
        }

        let mut master = match &event.recurrence_id {
            Some(master_id) => store
                .get_event(session, master_id)
                .await
                .ok_or_else(|| UseCaseErrors::NotFound(master_id.clone()))?,
            None => event.clone(),
        };

        match self.savemode {
            SaveMode::Current => {
                // drop just this instance, then record the exclusion
                if !store
                    .delete_instance(session, &event.id)
                    .await
                    .map_err(|_| UseCaseErrors::StorageError)?
                {
                    return Err(UseCaseErrors::StorageError);
                }
                if let Some(rule) = &mut master.recurrence {
                    rule.add_exdate(event.start);
                    if !store
                        .update_event(session, &master)
                        .await
                        .map_err(|_| UseCaseErrors::StorageError)?
                    {
                        return Err(UseCaseErrors::StorageError);
                    }
                }
                Ok(())
            }

            SaveMode::Future if event.id != master.id => {
                if !store
                    .delete_from(session, &master.id, event.start)
                    .await
                    .map_err(|_| UseCaseErrors::StorageError)?
                {
                    return Err(UseCaseErrors::StorageError);
                }
                if let Some(rule) = &mut master.recurrence {
                    rule.until = Some(event.start - Duration::days(1));
                    rule.count = None;
                    if !store
                        .update_event(session, &master)
                        .await
                        .map_err(|_| UseCaseErrors::StorageError)?
                    {
                        return Err(UseCaseErrors::StorageError);
                    }
                }
                Ok(())
            }

            // `all`, `new`, and `future` aimed at the master itself
            _ => match store.delete_series(session, &master.id, self.force).await {
                Ok(true) => Ok(()),
                _ => Err(UseCaseErrors::StorageError),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::{CalendarId, Event, Frequency, RecurrenceRule, TimeSpan};
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn session() -> Session {
        Session::new(1, "jane", chrono_tz::UTC)
    }

    async fn context_with_daily_master(count: u32) -> (AlmanacContext, EventObjectId, CalendarId) {
        let now = utc(2024, 1, 1, 0, 0);
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = session();
        let calendar = ctx.store.list_calendars(&session).await.unwrap()[0]
            .id
            .clone();

        let start = utc(2024, 1, 1, 9, 0);
        let mut event = Event::new(
            "master1",
            calendar.clone(),
            start,
            start + chrono::Duration::hours(1),
            now,
        );
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

    async fn series_starts(ctx: &AlmanacContext) -> Vec<DateTime<Utc>> {
        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        let mut events = ctx
            .store
            .load_events(&session(), &span, None, None)
            .await
            .unwrap();
        events.sort_by_key(|e| e.start);
        events.iter().map(|e| e.start).collect()
    }

    async fn occurrence_id(ctx: &AlmanacContext, start: DateTime<Utc>) -> EventObjectId {
        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        ctx.store
            .load_events(&session(), &span, None, None)
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.start == start)
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn current_mode_excludes_single_instance() {
        let (ctx, master_id, _) = context_with_daily_master(5).await;
        let target = occurrence_id(&ctx, utc(2024, 1, 3, 9, 0)).await;

        let usecase = DeleteEventUseCase {
            session: session(),
            event_id: target,
            savemode: SaveMode::Current,
            force: false,
        };
        execute(usecase, &ctx).await.unwrap();

        let starts = series_starts(&ctx).await;
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 1, 9, 0),
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 4, 9, 0),
                utc(2024, 1, 5, 9, 0),
            ]
        );

        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        assert_eq!(
            master.recurrence.unwrap().exdates,
            vec![utc(2024, 1, 3, 9, 0)]
        );
    }

    #[tokio::test]
    async fn future_mode_truncates_series() {
        let (ctx, master_id, _) = context_with_daily_master(10).await;
        let target = occurrence_id(&ctx, utc(2024, 1, 6, 9, 0)).await;

        let usecase = DeleteEventUseCase {
            session: session(),
            event_id: target,
            savemode: SaveMode::Future,
            force: false,
        };
        execute(usecase, &ctx).await.unwrap();

        let starts = series_starts(&ctx).await;
        assert_eq!(starts.len(), 5);
        assert_eq!(*starts.last().unwrap(), utc(2024, 1, 5, 9, 0));

        let master = ctx.store.get_event(&session(), &master_id).await.unwrap();
        let rule = master.recurrence.unwrap();
        assert_eq!(rule.until, Some(utc(2024, 1, 5, 9, 0)));
        assert_eq!(rule.count, None);
    }

    #[tokio::test]
    async fn all_mode_removes_whole_series() {
        let (ctx, master_id, _) = context_with_daily_master(5).await;
        let target = occurrence_id(&ctx, utc(2024, 1, 3, 9, 0)).await;

        let usecase = DeleteEventUseCase {
            session: session(),
            event_id: target,
            savemode: SaveMode::All,
            force: true,
        };
        execute(usecase, &ctx).await.unwrap();

        assert!(series_starts(&ctx).await.is_empty());
        assert!(ctx.store.get_event(&session(), &master_id).await.is_none());
    }
}
