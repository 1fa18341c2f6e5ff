use crate::{
    error::AlmanacError,
    event::save_event::{SaveEventUseCase, UseCaseErrors},
    event::EventForm,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Event, EventObjectId, SaveMode, Session};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub savemode: Option<SaveMode>,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::NotFound(event_id) => AlmanacError::NotFound(format!(
            "The event with id: {}, was not found.",
            event_id
        )),
        UseCaseErrors::NotRecurring => AlmanacError::BadClientData(
            "The targeted occurrence does not belong to a recurring event".into(),
        ),
        UseCaseErrors::InvalidRecurrenceRule => {
            AlmanacError::BadClientData("Invalid recurrence rule specified for the event".into())
        }
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn resize_event_controller(
    http_req: HttpRequest,
    body: web::Json<RequestBody>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let body = body.into_inner();
    let usecase = ResizeEventUseCase {
        session,
        event_id: EventObjectId::parse(&path_params.event_id),
        end: body.end,
        savemode: body.savemode.unwrap_or_default(),
    };

    execute(usecase, &ctx)
        .await
        .map(|event| HttpResponse::Ok().json(event))
        .map_err(handle_error)
}

/// Duration change via the grid's resize handle; like a move, it overlays
/// the stored record and re-enters the savemode state machine.
#[derive(Debug)]
pub struct ResizeEventUseCase {
    pub session: Session,
    pub event_id: EventObjectId,
    pub end: DateTime<Utc>,
    pub savemode: SaveMode,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ResizeEventUseCase {
    type Response = Event;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ResizeEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        let old = ctx
            .store
            .get_event(&self.session, &self.event_id)
            .await
            .ok_or_else(|| UseCaseErrors::NotFound(self.event_id.clone()))?;

        let mut form = EventForm::from_event(&old);
        form.end = self.end;

        let mut save = SaveEventUseCase {
            session: self.session.clone(),
            event_id: self.event_id.clone(),
            form,
            savemode: self.savemode,
        };
        save.execute(ctx).await
    }
}
