use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, CalendarProps, Session};
use almanac_infra::AlmanacContext;
use serde_json::json;

#[derive(Debug, serde::Deserialize)]
pub struct PathParams {
    pub calendar_id: String,
}

pub async fn update_calendar_controller(
    http_req: HttpRequest,
    body: web::Json<CalendarProps>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let mut props = body.into_inner();
    props.id = Some(CalendarId::new(path_params.calendar_id.clone()));
    let usecase = UpdateCalendarUseCase { session, props };

    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(|e| match e {
            UseCaseErrors::NotSaved => {
                AlmanacError::BadClientData("The calendar could not be updated".into())
            }
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct UpdateCalendarUseCase {
    pub session: Session,
    pub props: CalendarProps,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    NotSaved,
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for UpdateCalendarUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "UpdateCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        match ctx.store.edit_calendar(&self.session, &self.props).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(UseCaseErrors::NotSaved),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}
