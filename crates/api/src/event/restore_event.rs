use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{EventObjectId, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

pub async fn restore_event_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = RestoreEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
    };

    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(|e| match e {
            UseCaseErrors::NotRestorable => AlmanacError::Conflict(
                "The storage backend cannot restore deleted events".into(),
            ),
            UseCaseErrors::NotFound(event_id) => AlmanacError::NotFound(format!(
                "No deleted event with id: {}, was found.",
                event_id
            )),
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct RestoreEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotRestorable,
    NotFound(EventObjectId),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for RestoreEventUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "RestoreEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        if !ctx.store.capabilities().undelete {
            return Err(UseCaseErrors::NotRestorable);
        }
        match ctx.store.restore_event(&self.session, &self.event_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(UseCaseErrors::NotFound(self.event_id.clone())),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}
