use crate::{
    error::AlmanacError,
    ical::codec,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, Session, TimeSpan};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub calendars: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

pub async fn export_events_controller(
    http_req: HttpRequest,
    query: web::Query<QueryParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let query = query.into_inner();
    let usecase = ExportEventsUseCase {
        session,
        span: TimeSpan::new(query.start, query.end),
        calendars: query.calendars.map(|raw| {
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(CalendarId::new)
                .collect()
        }),
        method: query.method,
    };

    execute(usecase, &ctx)
        .await
        .map(|ical| {
            HttpResponse::Ok()
                .content_type("text/calendar; charset=utf-8")
                .body(ical)
        })
        .map_err(|e| match e {
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct ExportEventsUseCase {
    pub session: Session,
    pub span: TimeSpan,
    pub calendars: Option<Vec<CalendarId>>,
    pub method: Option<String>,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ExportEventsUseCase {
    type Response = String;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ExportEvents";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let events = ctx
            .store
            .load_events(
                &self.session,
                &self.span,
                None,
                self.calendars.as_deref(),
            )
            .await
            .map_err(|_| UseCaseErrors::StorageError)?;

        Ok(codec::export(
            &events,
            self.method.as_deref(),
            self.session.timezone,
            ctx.sys.now(),
        ))
    }
}
