use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Attachment, EventObjectId, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

pub async fn list_attachments_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = ListAttachmentsUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
    };

    execute(usecase, &ctx)
        .await
        .map(|attachments| HttpResponse::Ok().json(attachments))
        .map_err(|e| match e {
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct ListAttachmentsUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ListAttachmentsUseCase {
    type Response = Vec<Attachment>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ListAttachments";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        ctx.store
            .list_attachments(&self.session, &self.event_id)
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}
