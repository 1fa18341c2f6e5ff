use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Participant of an event. Serialized for relational storage as one line
/// per attendee: `NAME="..";STATUS=..;ROLE=..;EMAIL=..` with the name
/// quote-escaped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub role: AttendeeRole,
    pub status: AttendeeStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum AttendeeRole {
    Organizer,
    ReqParticipant,
    OptParticipant,
    NonParticipant,
    Chair,
}

impl Default for AttendeeRole {
    fn default() -> Self {
        Self::ReqParticipant
    }
}

impl Display for AttendeeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Organizer => "ORGANIZER",
            Self::ReqParticipant => "REQ-PARTICIPANT",
            Self::OptParticipant => "OPT-PARTICIPANT",
            Self::NonParticipant => "NON-PARTICIPANT",
            Self::Chair => "CHAIR",
        };
        write!(f, "{}", s)
    }
}

impl AttendeeRole {
    /// Lenient parse: anything unknown degrades to a required participant.
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ORGANIZER" => Self::Organizer,
            "OPT-PARTICIPANT" => Self::OptParticipant,
            "NON-PARTICIPANT" => Self::NonParticipant,
            "CHAIR" => Self::Chair,
            _ => Self::ReqParticipant,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum AttendeeStatus {
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl Default for AttendeeStatus {
    fn default() -> Self {
        Self::NeedsAction
    }
}

impl Display for AttendeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NeedsAction => "NEEDS-ACTION",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Tentative => "TENTATIVE",
            Self::Delegated => "DELEGATED",
        };
        write!(f, "{}", s)
    }
}

impl AttendeeStatus {
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ACCEPTED" => Self::Accepted,
            "DECLINED" => Self::Declined,
            "TENTATIVE" => Self::Tentative,
            "DELEGATED" => Self::Delegated,
            _ => Self::NeedsAction,
        }
    }
}

/// Flattens attendees to the line-per-attendee wire block. Entries without
/// both name and email are dropped.
pub fn serialize_attendees(attendees: &[Attendee]) -> String {
    let mut out = String::new();
    for attendee in attendees {
        if attendee.name.is_empty() && attendee.email.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "NAME=\"{}\";STATUS={};ROLE={};EMAIL={}\n",
            attendee.name.replace('\\', "\\\\").replace('"', "\\\""),
            attendee.status,
            attendee.role,
            attendee.email,
        ));
    }
    out.trim_end().to_string()
}

pub fn parse_attendees(block: &str) -> Vec<Attendee> {
    block
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_attendee_line)
        .collect()
}

fn parse_attendee_line(line: &str) -> Attendee {
    let mut attendee = Attendee {
        name: String::new(),
        email: String::new(),
        role: AttendeeRole::default(),
        status: AttendeeStatus::default(),
    };
    for prop in split_outside_quotes(line, ';') {
        let (key, value) = match prop.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match key.to_uppercase().as_str() {
            "NAME" => {
                attendee.name = unquote(value);
            }
            "EMAIL" => attendee.email = value.to_string(),
            "ROLE" => attendee.role = AttendeeRole::parse_or_default(value),
            "STATUS" => attendee.status = AttendeeStatus::parse_or_default(value),
            _ => {}
        }
    }
    attendee
}

/// Splits on `sep` while honoring double-quoted sections with backslash
/// escapes.
fn split_outside_quotes(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            c if c == sep && !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unquote(value: &str) -> String {
    let trimmed = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    // single pass so escaped backslashes cannot re-combine with following
    // characters
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialization_round_trip_preserves_quoted_name() {
        let attendees = vec![
            Attendee {
                name: "Jane \"JD\" Doe".into(),
                email: "j@example.com".into(),
                role: AttendeeRole::Organizer,
                status: AttendeeStatus::Accepted,
            },
            Attendee {
                name: "Per;Son".into(),
                email: "p@example.com".into(),
                role: AttendeeRole::ReqParticipant,
                status: AttendeeStatus::Tentative,
            },
        ];
        let block = serialize_attendees(&attendees);
        assert_eq!(parse_attendees(&block), attendees);
    }

    #[test]
    fn serializes_expected_wire_format() {
        let attendees = vec![Attendee {
            name: "Jane Doe".into(),
            email: "j@example.com".into(),
            role: AttendeeRole::Organizer,
            status: AttendeeStatus::Accepted,
        }];
        assert_eq!(
            serialize_attendees(&attendees),
            "NAME=\"Jane Doe\";STATUS=ACCEPTED;ROLE=ORGANIZER;EMAIL=j@example.com"
        );
    }

    #[test]
    fn skips_empty_entries() {
        let attendees = vec![Attendee {
            name: String::new(),
            email: String::new(),
            role: AttendeeRole::default(),
            status: AttendeeStatus::default(),
        }];
        assert_eq!(serialize_attendees(&attendees), "");
    }

    #[test]
    fn unknown_role_and_status_degrade_to_defaults() {
        let parsed = parse_attendee_line("NAME=\"X\";STATUS=WAT;ROLE=BOSS;EMAIL=x@y.z");
        assert_eq!(parsed.role, AttendeeRole::ReqParticipant);
        assert_eq!(parsed.status, AttendeeStatus::NeedsAction);
    }
}
