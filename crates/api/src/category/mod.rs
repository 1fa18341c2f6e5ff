use crate::{
    error::AlmanacError,
    shared::auth::protect_route,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpRequest, HttpResponse};
use almanac_domain::{Category, Session};
use almanac_infra::AlmanacContext;
use serde::Deserialize;
use serde_json::json;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/categories", web::get().to(list_categories_controller));
    cfg.route("/categories", web::post().to(add_category_controller));
    cfg.route("/categories/{name}", web::put().to(replace_category_controller));
    cfg.route(
        "/categories/{name}",
        web::delete().to(remove_category_controller),
    );
}

#[derive(Debug)]
pub enum UseCaseErrors {
    /// This backend's palette is fixed.
    Immutable,
    StorageError,
}

fn handle_error(e: UseCaseErrors) -> AlmanacError {
    match e {
        UseCaseErrors::Immutable => AlmanacError::Conflict(
            "The category palette of this storage backend cannot be changed".into(),
        ),
        UseCaseErrors::StorageError => AlmanacError::InternalError,
    }
}

pub async fn list_categories_controller(
    http_req: HttpRequest,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;
    let usecase = ListCategoriesUseCase { session };
    execute(usecase, &ctx)
        .await
        .map(|categories| HttpResponse::Ok().json(categories))
        .map_err(handle_error)
}

pub async fn add_category_controller(
    http_req: HttpRequest,
    body: web::Json<Category>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;
    let usecase = MutateCategoryUseCase {
        session,
        mutation: CategoryMutation::Add(body.into_inner()),
    };
    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(handle_error)
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
    pub name: String,
}

pub async fn replace_category_controller(
    http_req: HttpRequest,
    body: web::Json<Category>,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;
    let usecase = MutateCategoryUseCase {
        session,
        mutation: CategoryMutation::Replace {
            old_name: path_params.name.clone(),
            category: body.into_inner(),
        },
    };
    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(handle_error)
}

pub async fn remove_category_controller(
    http_req: HttpRequest,
    path_params: web::Path<PathParams>,
    ctx: web::Data<AlmanacContext>,
) -> Result<HttpResponse, AlmanacError> {
    let session = protect_route(&http_req)?;
    let usecase = MutateCategoryUseCase {
        session,
        mutation: CategoryMutation::Remove(path_params.name.clone()),
    };
    execute(usecase, &ctx)
        .await
        .map(|_| HttpResponse::Ok().json(json!({ "success": true })))
        .map_err(handle_error)
}

#[derive(Debug)]
pub struct ListCategoriesUseCase {
    pub session: Session,
}

#[async_trait::async_trait(?Send)]
impl UseCase for ListCategoriesUseCase {
    type Response = Vec<Category>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "ListCategories";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        ctx.store
            .list_categories(&self.session)
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}

#[derive(Debug)]
pub enum CategoryMutation {
    Add(Category),
    Replace { old_name: String, category: Category },
    Remove(String),
}

#[derive(Debug)]
pub struct MutateCategoryUseCase {
    pub session: Session,
    pub mutation: CategoryMutation,
}

#[async_trait::async_trait(?Send)]
impl UseCase for MutateCategoryUseCase {
    type Response = ();

    type Errors = UseCaseErrors;

    const NAME: &'static str = "MutateCategory";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Errors> {
        if ctx.store.capabilities().categories_immutable {
            return Err(UseCaseErrors::Immutable);
        }
        let session = &self.session;
        let result = match &self.mutation {
            CategoryMutation::Add(category) => ctx.store.add_category(session, category).await,
            CategoryMutation::Replace { old_name, category } => {
                ctx.store.replace_category(session, old_name, category).await
            }
            CategoryMutation::Remove(name) => ctx.store.remove_category(session, name).await,
        };
        match result {
            Ok(true) => Ok(()),
            _ => Err(UseCaseErrors::StorageError),
        }
    }
}
