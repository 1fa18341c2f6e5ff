use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Calendar, Session};
use almanac_infra::AlmanacContext;

pub async fn list_calendars_controller(
    http_req: HttpRequest,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = ListCalendarsUseCase { session };

    execute(usecase, &ctx)
        .await
        .map(|calendars| HttpResponse::Ok().json(calendars))
        .map_err(|e| match e {
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct ListCalendarsUseCase {
    pub session: Session,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ListCalendarsUseCase {
    type Response = Vec<Calendar>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ListCalendars";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        ctx.store
            .list_calendars(&self.session)
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}
