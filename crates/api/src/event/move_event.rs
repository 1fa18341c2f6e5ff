use crate::{
    error::AlmanacError,
    event::save_event::{SaveEventUseCase, UseCaseErrors},
    event::EventForm,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Event, EventObjectId, SaveMode, Session};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
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

pub async fn move_event_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let body = body.into_inner();
    let usecase = MoveEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        start: body.start,
        end: body.end,
        savemode: body.savemode.unwrap_or_default(),
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Ok().json(event))
        .map_err(handle_error)
}

/// A drag on the calendar grid: the stored record with new start/end,
/// re-entering the ordinary save path so savemode branching applies to
/// drags exactly as to form edits.
#[derive(Debug)]
pub struct MoveEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub savemode: SaveMode,
}

#[async_trait::async_trait(?Send)]
impl UseCase for MoveEventUseCase {
    type Response = Event;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "MoveEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let old = ctx
            .store
            .get_event(&self.session, &self.event_id)
            .await
            .ok_or_else(|| UseCaseErrors::NotFound(self.event_id.clone()))?;

        let mut form = EventForm::from_event(&old);
        form.start = self.start;
        form.end = self.end;

        let mut save = SaveEventUseCase {
            session: self.session.clone(),
            event_id: self.event_id.clone(),
            form,
            savemode: self.savemode,
        };
        save.execute(ctx).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::{Frequency, RecurrenceRule, TimeSpan};
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[tokio::test]
    async fn drag_of_occurrence_goes_through_savemode_branching() {
        let now = utc(2024, 1, 1, 0, 0);
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);
        let calendar = ctx.store.list_calendars(&session).await.unwrap()[0]
            .id
            .clone();

        let start = utc(2024, 1, 1, 9, 0);
        let mut event = Event::new("m1", calendar, start, start + Duration::hours(1), now);
        event.recurrence = Some(RecurrenceRule {
            freq: Frequency::Daily,
            count: Some(5),
            ..Default::default()
        });
        let master_id = ctx
            .store
            .new_event(&session, &event)
            .await
            .unwrap()
            .unwrap();

        // drag the Jan 3 occurrence to the afternoon, detaching it
        let usecase = MoveEventUseCase {
            session: session.clone(),
            event_id: EventObjectId::parse("m1-2"),
            start: utc(2024, 1, 3, 15, 0),
            end: utc(2024, 1, 3, 16, 0),
            savemode: SaveMode::Current,
        };
        let detached = execute(usecase, &ctx).await.unwrap();
        assert_eq!(detached.start, utc(2024, 1, 3, 15, 0));
        assert!(detached.recurrence.is_none());

        let master = ctx.store.get_event(&session, &master_id).await.unwrap();
        assert_eq!(
            master.recurrence.unwrap().exdates,
            vec![utc(2024, 1, 3, 9, 0)]
        );

        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 1, 10, 0, 0));
        let events = ctx
            .store
            .load_events(&session, &span, None, None)
            .await
            .unwrap();
        assert_eq!(events.len(), 5);
    }
}
