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
    pub attachment_id: String,
}

pub async fn get_attachment_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = GetAttachmentUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        attachment_id: path_params.attachment_id.clone(),
        with_body: false,
    };

    execute(usecase, &ctx)
        .await
        .map(|attachment| HttpResponse::Ok().json(attachment))
        .map_err(handle_error)
}

pub async fn get_attachment_body_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = GetAttachmentUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        attachment_id: path_params.attachment_id.clone(),
        with_body: true,
    };

    execute(usecase, &ctx).await.map_err(handle_error).map(|attachment| {
        HttpResponse::Ok()
            .content_type(attachment.mimetype.clone())
            .body(attachment.data.unwrap_or_default())
    })
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NotFound(id) => AlmanacError::NotFound(format!(
            "The attachment with id: {}, was not found.",
            id
        )),
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

#[derive(Debug)]
pub struct GetAttachmentUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub attachment_id: String,
    pub with_body: bool,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(String),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for GetAttachmentUseCase {
    type Response = Attachment;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "GetAttachment";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let store = &ctx.store;
        let mut attachment = store
            .get_attachment(&self.session, &self.attachment_id, &self.event_id)
            .await
            .map_err(|_| UseCaseErrors::StorageError)?
            .ok_or_else(|| UseCaseErrors::NotFound(self.attachment_id.clone()))?;

        if self.with_body {
            attachment.data = store
                .get_attachment_body(&self.session, &self.attachment_id, &self.event_id)
                .await
                .map_err(|_| UseCaseErrors::StorageError)?;
        }
        Ok(attachment)
    }
}
