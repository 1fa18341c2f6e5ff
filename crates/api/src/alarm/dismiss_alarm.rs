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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// 0 clears the pending notification permanently; a positive value
    /// re-arms it that many seconds from now.
    #[serde(default)]
    pub snooze: i64,
}

pub async fn dismiss_alarm_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = DismissAlarmUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        snooze_seconds: body.snooze.max(0),
    };

    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(|e| match e {
            UseCaseErrors::NotFound(id) => AlmanacError::NotFound(format!(
                "The event with id: {}, was not found.",
                id
            )),
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct DismissAlarmUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub snooze_seconds: i64,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotFound(EventObjectId),
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for DismissAlarmUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "DismissAlarm";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        match ctx
            .store
            .dismiss_alarm(&self.session, &self.event_id, self.snooze_seconds)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(UseCaseErrors::NotFound(self.event_id.clone())),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}
