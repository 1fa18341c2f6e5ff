use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Event, Session};
use almanac_infra::AlmanacContext;

/// Driven by the client's keep-alive cycle: returns whatever alarms came
/// due since the caller last asked. The document backend additionally
/// gates real scans to one per five-minute slot.
pub async fn pending_alarms_controller(
    http_req: HttpRequest,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = PendingAlarmsUseCase { session };

    execute(usecase, &ctx)
        .await
        .map(|alarms| HttpResponse::Ok().json(alarms))
        .map_err(|e| match e {
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct PendingAlarmsUseCase {
    pub session: Session,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for PendingAlarmsUseCase {
    type Response = Vec<Event>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "PendingAlarms";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        ctx.store
            .pending_alarms(&self.session, now)
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}
