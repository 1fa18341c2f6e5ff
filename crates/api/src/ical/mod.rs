pub(crate) mod codec;
mod export_events;
mod import_events;

use actix_web::web;
use export_events::export_events_controller;
use import_events::import_events_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ical/import", web::post().to(import_events_controller));
    cfg.route("/ical/export", web::get().to(export_events_controller));
}
