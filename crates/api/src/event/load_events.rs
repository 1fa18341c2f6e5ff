use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, Event, Session, TimeSpan};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub q: Option<String>,
    /// Comma-separated calendar ids; all of the user's calendars when
    /// absent.
    #[serde(default)]
    pub calendars: Option<String>,
}

pub async fn load_events_controller(
    http_req: HttpRequest,
    query: web::Query<QueryParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let query = query.into_inner();
    let usecase = LoadEventsUseCase {
        session,
        span: TimeSpan::new(query.start, query.end),
        search: query.q,
        calendars: query.calendars.map(|raw| {
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(CalendarId::new)
                .collect()
        }),
    };

    execute(usecase, &ctx)
        .await
        .map(|events| HttpResponse::Ok().json(events))
        .map_err(|e| match e {
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct LoadEventsUseCase {
    pub session: Session,
    pub span: TimeSpan,
    pub search: Option<String>,
    pub calendars: Option<Vec<CalendarId>>,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for LoadEventsUseCase {
    type Response = Vec<Event>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "LoadEvents";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        ctx.store
            .load_events(
                &self.session,
                &self.span,
                self.search.as_deref(),
                self.calendars.as_deref(),
            )
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}
