use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{CalendarId, CalendarProps, Session};
use almanac_infra::AlmanacContext;
use serde_json::json;

pub async fn create_calendar_controller(
    http_req: HttpRequest,
    body: web::Json<CalendarProps>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;

    let usecase = CreateCalendarUseCase {
        session,
        props: body.into_inner(),
    };

    execute(usecase, &ctx)
        .await
        .map(|id| HttpResponse::Created().json(json!({ "id": id })))
        .map_err(|e| match e {
            UseCaseErrors::InvalidProperties => AlmanacError::BadClientData(
                "Invalid or conflicting calendar properties".into(),
            ),
            UseCaseErrors::StorageError => AlmanacError::InternalError,
        })
}

#[derive(Debug)]
pub struct CreateCalendarUseCase {
    pub session: Session,
    pub props: CalendarProps,
}

#[derive(Debug)]
pub enum UseCaseErrors {
    InvalidProperties,
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for CreateCalendarUseCase {
    type Response = CalendarId;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "CreateCalendar";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        match ctx.store.create_calendar(&self.session, &self.props).await {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(UseCaseErrors::InvalidProperties),
            Err(_) => Err(UseCaseErrors::StorageError),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn rejects_invalid_folder_names() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);

        let too_long = "x".repeat(200);
        for name in ["", too_long.as_str(), "bad*name", "bad%name"] {
            let usecase = CreateCalendarUseCase {
                session: session.clone(),
                props: CalendarProps {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
            };
            assert!(
                matches!(
                    execute(usecase, &ctx).await,
                    Err(UseCaseErrors::InvalidProperties)
                ),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn creates_and_lists_calendar() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ctx = AlmanacContext::create_inmemory_at("jane", now);
        let session = Session::new(1, "jane", chrono_tz::UTC);

        let usecase = CreateCalendarUseCase {
            session: session.clone(),
            props: CalendarProps {
                name: Some("Work".into()),
                color: Some("36c1c0".into()),
                ..Default::default()
            },
        };
        let id = execute(usecase, &ctx).await.unwrap();

        let calendars = ctx.store.list_calendars(&session).await.unwrap();
        let created = calendars.iter().find(|c| c.id == id).unwrap();
        assert_eq!(created.name, "Work");
        assert_eq!(created.color, "36c1c0");
    }
}
