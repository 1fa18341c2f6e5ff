mod create_event;
mod delete_event;
mod get_event;
mod load_events;
mod move_event;
mod resize_event;
mod restore_event;
pub(crate) mod save_event;

use actix_web::web;
use almanac_domain::{
    AlarmSpec, Attachment, Attendee, CalendarId, Event, FreeBusy, RecurrenceRule, Sensitivity,
};
use chrono::{DateTime, Utc};
use create_event::create_event_controller;
use delete_event::delete_event_controller;
use get_event::get_event_controller;
use load_events::load_events_controller;
use move_event::move_event_controller;
use resize_event::resize_event_controller;
use restore_event::restore_event_controller;
use save_event::save_event_controller;
use serde::Deserialize;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/events", web::post().to(create_event_controller));
    cfg.route("/events", web::get().to(load_events_controller));

    cfg.route("/events/{event_id}", web::get().to(get_event_controller));
    cfg.route("/events/{event_id}", web::put().to(save_event_controller));
    cfg.route("/events/{event_id}", web::delete().to(delete_event_controller));

    cfg.route("/events/{event_id}/move", web::put().to(move_event_controller));
    cfg.route(
        "/events/{event_id}/resize",
        web::put().to(resize_event_controller),
    );
    cfg.route(
        "/events/{event_id}/restore",
        web::put().to(restore_event_controller),
    );
}

/// The complete event record as submitted by the client form. Every save
/// carries the full state; partial moves/resizes are expanded into a full
/// form from the stored record before entering the save path.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    #[serde(default)]
    pub calendar_id: Option<CalendarId>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub allday: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub free_busy: FreeBusy,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub alarm: Option<AlarmSpec>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn default_priority() -> u8 {
    1
}

impl EventForm {
    /// Re-creates the form a client would have submitted for this record.
    pub fn from_event(event: &Event) -> Self {
        Self {
            calendar_id: Some(event.calendar_id.clone()),
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            allday: event.allday,
            description: event.description.clone(),
            location: event.location.clone(),
            categories: event.categories.clone(),
            free_busy: event.free_busy,
            priority: event.priority,
            sensitivity: event.sensitivity,
            attendees: event.attendees.clone(),
            alarm: event.alarm,
            recurrence: event.recurrence.clone(),
            attachments: event.attachments.clone(),
        }
    }

    /// Writes the submitted state over a stored record, leaving identity
    /// fields (id, uid, series links, created) untouched.
    pub fn overlay(&self, event: &mut Event) {
        if let Some(calendar_id) = &self.calendar_id {
            event.calendar_id = calendar_id.clone();
        }
        event.title = self.title.clone();
        event.start = self.start;
        event.end = self.end;
        event.allday = self.allday;
        event.description = self.description.clone();
        event.location = self.location.clone();
        event.categories = self.categories.clone();
        event.free_busy = self.free_busy;
        event.priority = self.priority;
        event.sensitivity = self.sensitivity;
        event.attendees = self.attendees.clone();
        event.alarm = self.alarm;
        event.recurrence = self.recurrence.clone();
        event.attachments = self.attachments.clone();
    }
}
