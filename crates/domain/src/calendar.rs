use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const DEFAULT_CALENDAR_COLOR: &str = "cc0000";

/// Identifier of a calendar: a numeric row id in the relational backend, a
/// folder-derived token in the document backend. Opaque to callers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(String);

impl CalendarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_db_id(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Display for CalendarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CalendarId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// A named event container owned by a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: CalendarId,
    pub name: String,
    pub color: String,
    /// Whether alarms of this calendar's events are surfaced to the user.
    pub showalarms: bool,
    /// Backend-derived: folder ACL in the document backend, always false in
    /// the relational one.
    pub readonly: bool,
    pub subscribed: bool,
}

/// Properties submitted when creating or editing a calendar. Unset fields
/// keep their current value on edit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CalendarId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub showalarms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed: Option<bool>,
}

/// A single entry of the category palette.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub color: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn calendar_id_db_conversion() {
        assert_eq!(CalendarId::from(7).as_db_id(), Some(7));
        assert_eq!(CalendarId::new("cal-folder").as_db_id(), None);
    }
}
