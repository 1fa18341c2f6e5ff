use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Event, EventObjectId, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

pub async fn get_event_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = GetEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Ok().json(event))
        .map_err(|e| match e {
            UseCaseErrors::NotFound(event_id) => AlmanacError::NotFound(format!(
                "The event with id: {}, was not found.",
                event_id
            )),
        })
}

#[derive(Debug)]
pub struct GetEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(EventObjectId),
}

#[async_trait::async_trait(?Send)]
impl UseCase for GetEventUseCase {
    type Response = Event;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "GetEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        ctx.store
            .get_event(&self.session, &self.event_id)
            .await
            .ok_or_else(|| UseCaseErrors::NotFound(self.event_id.clone()))
    }
}
