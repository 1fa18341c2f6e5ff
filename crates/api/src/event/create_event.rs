use crate::{
    error::AlmanacError,
    event::EventForm,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Event, EventObjectId, Session};
use almanac_infra::AlmanacContext;
use almanac_utils::generate_uid;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    #[serde(flatten)]
    pub event: EventForm,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NoCalendar => {
            AlmanacError::BadClientData("The referenced calendar is not available".into())
        }
        UseCaseErrors::InvalidRecurrenceRule => {
            AlmanacError::BadClientData("Invalid recurrence rule specified for the event".into())
        }
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn create_event_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = CreateEventUseCase {
        session,
        form: body.into_inner().event,
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Created().json(event))
        .map_err(handle_error)
}

#[derive(Debug)]
pub struct CreateEventUseCase {
    pub session: Session,
    pub form: EventForm,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NoCalendar,
    InvalidRecurrenceRule,
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for CreateEventUseCase {
    type Response = Event;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "CreateEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let store = &ctx.store;
        let session = &self.session;

        if let Some(rule) = &self.form.recurrence {
            if !rule.is_valid(self.form.start) {
                return Err(UseCaseErrors::InvalidRecurrenceRule);
            }
        }

        // an unset calendar falls back to the user's first one
        let calendar_id = match self.form.calendar_id.clone() {
            Some(calendar_id) => calendar_id,
            None => store
                .list_calendars(session)
                .await
                .ok()
                .and_then(|calendars| calendars.into_iter().find(|c| !c.readonly))
                .map(|c| c.id)
                .ok_or(UseCaseErrors::NoCalendar)?,
        };

        let uid = generate_uid();
        let mut event = Event::new(
            uid.clone(),
            calendar_id,
            self.form.start,
            self.form.end,
            ctx.sys.now(),
        );
        event.id = EventObjectId::Uid(uid);
        self.form.overlay(&mut event);

        match store.new_event(session, &event).await {
            Ok(Some(id)) => {
                event.id = id;
                Ok(event)
            }
            Ok(None) => Err(UseCaseErrors::NoCalendar),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::TimeSpan;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn form(start: DateTime<Utc>) -> EventForm {
        EventForm {
            calendar_id: None,
            title: "Lunch".into(),
            start,
            end: start + Duration::hours(1),
            allday: false,
            description: String::new(),
            location: String::new(),
            categories: String::new(),
            free_busy: Default::default(),
            priority: 1,
            sensitivity: Default::default(),
            attendees: Vec::new(),
            alarm: None,
            recurrence: None,
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn defaults_to_first_writable_calendar() {
        let now = utc(2024, 1, 1, 0, 0);
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);

        let usecase = CreateEventUseCase {
            session: session.clone(),
            form: form(utc(2024, 1, 2, 12, 0)),
        };
        let event = execute(usecase, &ctx).await.unwrap();

        let span = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 1, 7, 0, 0));
        let listed = ctx
            .store
            .load_events(&session, &span, None, None)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].uid, event.uid);
        assert_eq!(listed[0].calendar_id, event.calendar_id);
    }

    #[tokio::test]
    async fn rejects_unknown_calendar() {
        let now = utc(2024, 1, 1, 0, 0);
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);

        let mut bad = form(utc(2024, 1, 2, 12, 0));
        bad.calendar_id = Some(almanac_domain::CalendarId::new("nope"));
        let usecase = CreateEventUseCase {
            session,
            form: bad,
        };
        assert!(matches!(
            execute(usecase, &ctx).await,
            Err(UseCaseErrors::NoCalendar)
        ));
    }
}
