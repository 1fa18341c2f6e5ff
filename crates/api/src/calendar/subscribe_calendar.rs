use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub calendar_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub active: bool,
}

pub async fn subscribe_calendar_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = SubscribeCalendarUseCase {
        session,
        calendar_id: CalendarId::new(path_params.calendar_id.clone()),
        active: body.active,
    };

    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(|e| match e {
            UseCaseErrors::NotFound(id) => AlmanacError::NotFound(format!(
                "The calendar with id: {}, was not found.",
                id
            )),
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct SubscribeCalendarUseCase {
    pub session: Session,
    pub calendar_id: CalendarId,
    pub active: bool,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(CalendarId),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for SubscribeCalendarUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "SubscribeCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        match ctx
            .store
            .subscribe_calendar(&self.session, &self.calendar_id, self.active)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(UseCaseErrors::NotFound(self.calendar_id.clone())),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}
