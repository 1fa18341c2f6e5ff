mod create_calendar;
mod delete_calendar;
mod list_calendars;
mod subscribe_calendar;
mod update_calendar;

use actix_web::web;
use create_calendar::create_calendar_controller;
use delete_calendar::delete_calendar_controller;
use list_calendars::list_calendars_controller;
use subscribe_calendar::subscribe_calendar_controller;
use update_calendar::update_calendar_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/calendars", web::get().to(list_calendars_controller));
    cfg.route("/calendars", web::post().to(create_calendar_controller));
    cfg.route(
        "/calendars/{calendar_id}",
        web::put().to(update_calendar_controller),
    );
    cfg.route(
        "/calendars/{calendar_id}",
        web::delete().to(delete_calendar_controller),
    );
    cfg.route(
        "/calendars/{calendar_id}/subscription",
        web::put().to(subscribe_calendar_controller),
    );
}
