mod get_attachment;
mod list_attachments;

use actix_web::web;
use get_attachment::{get_attachment_body_controller, get_attachment_controller};
use list_attachments::list_attachments_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/events/{event_id}/attachments",
        web::get().to(list_attachments_controller),
    );
    cfg.route(
        "/events/{event_id}/attachments/{attachment_id}",
        web::get().to(get_attachment_controller),
    );
    cfg.route(
        "/events/{event_id}/attachments/{attachment_id}/body",
        web::get().to(get_attachment_body_controller),
    );
}
