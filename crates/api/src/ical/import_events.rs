use crate::{
    error::AlmanacError,
    ical::codec,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, Event, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    #[serde(default)]
    pub calendar: Option<String>,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NothingToImport => {
            AlmanacError::BadClientData("No importable events found in the input".into())
        }
        UseCaseErrors::NoCalendar => {
            AlmanacError::BadClientData("The referenced calendar is not available".into())
        }
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn import_events_controller(
    http_req: HttpRequest,
    body: String,
    query: web::Query<QueryParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = ImportEventsUseCase {
        session,
        ical_text: body,
        calendar_id: query.into_inner().calendar.map(CalendarId::new),
    };

    execute(usecase, &ctx)
        .await
        .map(|events| HttpResponse::Ok().json(events))
        .map_err(handle_error)
}

/// Parses the submitted iCalendar text and stores every VEVENT into the
/// target calendar (the user's first writable one when unspecified).
#[derive(Debug)]
pub struct ImportEventsUseCase {
    pub session: Session,
    pub ical_text: String,
    pub calendar_id: Option<CalendarId>,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NothingToImport,
    NoCalendar,
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ImportEventsUseCase {
    type Response = Vec<Event>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ImportEvents";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let store = &ctx.store;
        let session = &self.session;
        let now = ctx.sys.now();

        let parsed = codec::import(&self.ical_text, session.timezone, now);
        if parsed.is_empty() {
            return Err(UseCaseErrors::NothingToImport);
        }

        let calendar_id = match self.calendar_id.clone() {
            Some(calendar_id) => calendar_id,
            None => store
                .list_calendars(session)
                .await
                .ok()
                .and_then(|calendars| calendars.into_iter().find(|c| !c.readonly))
                .map(|c| c.id)
                .ok_or(UseCaseErrors::NoCalendar)?,
        };

        let mut imported = Vec::with_capacity(parsed.len());
        for mut event in parsed {
            event.calendar_id = calendar_id.clone();
            match store.new_event(session, &event).await {
                Ok(Some(id)) => {
                    event.id = id;
                    imported.push(event);
                }
                Ok(None) => return Err(UseCaseErrors::NoCalendar),
                Err(_) => return Err(UseCaseErrors::StorageError),
            }
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::TimeSpan;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn imports_into_default_calendar() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);

        let ical = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:imp1\r\n\
                    SUMMARY:Imported\r\nDTSTART:20240315T100000Z\r\nDTEND:20240315T110000Z\r\n\
                    END:VEVENT\r\nEND:VCALENDAR\r\n";
        let usecase = ImportEventsUseCase {
            session: session.clone(),
            ical_text: ical.into(),
            calendar_id: None,
        };
        let imported = execute(usecase, &ctx).await.unwrap();
        assert_eq!(imported.len(), 1);

        let span = TimeSpan::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        );
        let events = ctx
            .store
            .load_events(&session, &span, None, None)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Imported");
    }

    #[tokio::test]
    async fn rejects_empty_input() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let usecase = ImportEventsUseCase {
            session: Session::new(1, "jane", chrono_tz::UTC),
            ical_text: "not an icalendar".into(),
            calendar_id: None,
        };
        assert!(matches!(
            execute(usecase, &ctx).await,
            Err(UseCaseErrors::NothingToImport)
        ));
    }
}
