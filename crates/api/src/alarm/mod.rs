mod dismiss_alarm;
mod pending_alarms;

use actix_web::web;
use dismiss_alarm::dismiss_alarm_controller;
use pending_alarms::pending_alarms_controller;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/alarms/pending", web::get().to(pending_alarms_controller));
    cfg.route(
        "/alarms/{event_id}/dismiss",
        web::put().to(dismiss_alarm_controller),
    );
}
