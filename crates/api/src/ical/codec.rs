//! iCalendar import/export.
//!
//! Parsing is deliberately narrow: VEVENT blocks and the properties the
//! data model carries. Emission follows RFC 5545 (75-octet folding,
//! backslash escaping of `: ; , \n`, DATE-only forms for all-day events).

use almanac_domain::{
    Attendee, AttendeeRole, AttendeeStatus, CalendarId, Event, EventObjectId, FreeBusy,
    RecurrenceRule, Sensitivity,
};
use almanac_utils::generate_uid;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const EOL: &str = "\r\n";
const PRODID: &str = "-//Almanac//NONSGML Calendar//EN";
const MAX_LINE_OCTETS: usize = 75;

// ---------------------------------------------------------------- import

#[derive(Debug)]
struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

/// Parses every VEVENT in the input. Unknown properties and components are
/// skipped; a VEVENT without a UID gets a fresh one.
pub fn import(text: &str, tz: Tz, now: DateTime<Utc>) -> Vec<Event> {
    let unfolded = unfold(text);
    let mut events = Vec::new();
    let mut current: Option<Vec<Property>> = None;
    let mut skip_depth = 0usize;

    for line in unfolded.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();
        if upper == "BEGIN:VEVENT" {
            current = Some(Vec::new());
            continue;
        }
        if upper == "END:VEVENT" {
            if let Some(props) = current.take() {
                events.push(to_event(props, tz, now));
            }
            continue;
        }
        if current.is_some() {
            // nested components (VALARM and friends) are not imported
            if upper.starts_with("BEGIN:") {
                skip_depth += 1;
                continue;
            }
            if upper.starts_with("END:") {
                skip_depth = skip_depth.saturating_sub(1);
                continue;
            }
            if skip_depth > 0 {
                continue;
            }
            if let Some(prop) = parse_property(line) {
                current.as_mut().unwrap().push(prop);
            }
        }
    }

    events
}

fn to_event(props: Vec<Property>, tz: Tz, now: DateTime<Utc>) -> Event {
    let epoch = now;
    let mut event = Event::new("", CalendarId::new(""), epoch, epoch, now);
    // import defaults
    event.free_busy = FreeBusy::Busy;
    event.priority = 1;

    let mut organizer: Option<Attendee> = None;
    let mut exdates: Vec<DateTime<Utc>> = Vec::new();
    let mut have_end = false;

    for prop in &props {
        match prop.name.as_str() {
            "UID" => event.uid = prop.value.clone(),
            "SUMMARY" => event.title = unescape(&prop.value),
            "DESCRIPTION" => event.description = unescape(&prop.value),
            "LOCATION" => event.location = unescape(&prop.value),
            "CATEGORIES" => {
                event.categories = unescape(&prop.value)
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();
            }
            "DTSTAMP" => {
                if let Some((changed, _)) = parse_datetime(prop, tz) {
                    event.changed = changed;
                }
            }
            "DTSTART" => {
                if let Some((start, date_only)) = parse_datetime(prop, tz) {
                    event.start = start;
                    event.allday = date_only;
                }
            }
            "DTEND" => {
                if let Some((end, _)) = parse_datetime(prop, tz) {
                    event.end = end;
                    have_end = true;
                }
            }
            "ORGANIZER" => {
                let email = strip_mailto(&prop.value);
                let entry = Attendee {
                    name: param(prop, "CN").map(|v| unescape(&v)).unwrap_or_default(),
                    email,
                    role: AttendeeRole::Organizer,
                    status: AttendeeStatus::Accepted,
                };
                // already listed as an attendee: upgrade the role instead
                if let Some(existing) = event
                    .attendees
                    .iter_mut()
                    .find(|a| a.email == entry.email)
                {
                    existing.role = AttendeeRole::Organizer;
                } else {
                    organizer = Some(entry);
                }
            }
            "ATTENDEE" => {
                let email = strip_mailto(&prop.value);
                let mut attendee = Attendee {
                    name: param(prop, "CN").map(|v| unescape(&v)).unwrap_or_default(),
                    email,
                    role: param(prop, "ROLE")
                        .map(|v| AttendeeRole::parse_or_default(&v))
                        .unwrap_or_default(),
                    status: param(prop, "PARTSTAT")
                        .map(|v| AttendeeStatus::parse_or_default(&v))
                        .unwrap_or_default(),
                };
                if let Some(organizer) = &organizer {
                    if organizer.email == attendee.email {
                        attendee.role = AttendeeRole::Organizer;
                    }
                }
                event.attendees.push(attendee);
            }
            "TRANSP" => {
                event.free_busy = if prop.value.eq_ignore_ascii_case("TRANSPARENT") {
                    FreeBusy::Free
                } else {
                    FreeBusy::Busy
                };
            }
            "STATUS" => {
                if prop.value.eq_ignore_ascii_case("TENTATIVE") {
                    event.free_busy = FreeBusy::Tentative;
                }
            }
            "X-MICROSOFT-CDO-BUSYSTATUS" => {
                let value = prop.value.to_uppercase();
                if value == "OOF" {
                    event.free_busy = FreeBusy::OutOfOffice;
                } else if matches!(value.as_str(), "FREE" | "BUSY" | "TENTATIVE") {
                    event.free_busy = FreeBusy::parse_or_default(&value);
                }
            }
            "PRIORITY" => {
                if let Ok(priority) = prop.value.parse::<i32>() {
                    event.priority = if priority <= 4 {
                        2 // high
                    } else if priority == 5 {
                        1 // normal
                    } else {
                        0 // low
                    };
                }
            }
            "CLASS" | "X-CALENDARSERVER-ACCESS" => {
                event.sensitivity = match prop.value.to_uppercase().as_str() {
                    "PRIVATE" => Sensitivity::Private,
                    "CONFIDENTIAL" => Sensitivity::Confidential,
                    _ => Sensitivity::Public,
                };
            }
            "RRULE" => {
                event.recurrence = normalize_rrule(&prop.value).parse::<RecurrenceRule>().ok();
            }
            "EXDATE" => {
                for value in prop.value.split(',') {
                    let fake = Property {
                        name: "EXDATE".into(),
                        params: prop.params.clone(),
                        value: value.to_string(),
                    };
                    if let Some((exdate, _)) = parse_datetime(&fake, tz) {
                        exdates.push(exdate);
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(organizer) = organizer {
        if !event.attendees.iter().any(|a| a.email == organizer.email) {
            event.attendees.insert(0, organizer);
        }
    }

    // excluded instants belong to the structured rule
    if let Some(rule) = &mut event.recurrence {
        for exdate in exdates {
            rule.add_exdate(exdate);
        }
    }

    if event.uid.is_empty() {
        event.uid = generate_uid();
    }
    event.id = EventObjectId::Uid(event.uid.clone());

    if event.allday {
        // all-day normalization: local midnight plus the placeholder hour
        event.end = event.start + Duration::hours(1);
    } else if !have_end || event.end < event.start {
        event.end = event.start;
    }

    event
}

fn parse_property(line: &str) -> Option<Property> {
    let colon = find_unquoted(line, ':')?;
    let (head, value) = line.split_at(colon);
    let value = &value[1..];

    let mut head_parts = split_unquoted(head, ';');
    if head_parts.is_empty() {
        return None;
    }
    let name = head_parts.remove(0).to_uppercase();
    let params = head_parts
        .iter()
        .filter_map(|p| {
            p.split_once('=').map(|(k, v)| {
                (
                    k.to_uppercase(),
                    v.trim_matches('"').to_string(),
                )
            })
        })
        .collect();

    Some(Property {
        name,
        params,
        value: value.to_string(),
    })
}

fn param(prop: &Property, name: &str) -> Option<String> {
    prop.params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// (instant, was-a-date-only-value)
fn parse_datetime(prop: &Property, tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    let value = prop.value.trim();
    let date_only = param(prop, "VALUE").map(|v| v == "DATE").unwrap_or(false)
        || (value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()));

    if date_only {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let local = tz.from_local_datetime(&midnight).earliest()?;
        return Some((local.with_timezone(&Utc), true));
    }

    if let Some(stripped) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some((Utc.from_utc_datetime(&naive), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    let zone: Tz = param(prop, "TZID")
        .and_then(|name| name.parse().ok())
        .unwrap_or(tz);
    let local = zone.from_local_datetime(&naive).earliest()?;
    Some((local.with_timezone(&Utc), false))
}

fn strip_mailto(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix("mailto:")
        .or_else(|| value.strip_prefix("MAILTO:"))
        .unwrap_or(value)
        .to_string()
}

/// The structured parser wants full timestamps; RRULEs in the wild carry
/// DATE-only UNTIL values.
fn normalize_rrule(value: &str) -> String {
    value
        .split(';')
        .map(|part| match part.split_once('=') {
            Some(("UNTIL", v)) if v.len() == 8 => format!("UNTIL={}T000000", v),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn unfold(text: &str) -> String {
    text.replace("\r\n ", "")
        .replace("\r\n\t", "")
        .replace("\n ", "")
        .replace("\n\t", "")
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

fn split_unquoted(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == sep && !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

// ---------------------------------------------------------------- export

/// Emits one VEVENT per input event, masters and occurrences alike; picking
/// which to pass is the caller's call.
pub fn export(events: &[Event], method: Option<&str>, tz: Tz, now: DateTime<Utc>) -> String {
    let mut ical = String::new();
    ical.push_str("BEGIN:VCALENDAR");
    ical.push_str(EOL);
    ical.push_str("VERSION:2.0");
    ical.push_str(EOL);
    ical.push_str(&format!("PRODID:{}", PRODID));
    ical.push_str(EOL);
    ical.push_str("CALSCALE:GREGORIAN");
    ical.push_str(EOL);
    if let Some(method) = method {
        ical.push_str(&format!("METHOD:{}", method.to_uppercase()));
        ical.push_str(EOL);
    }

    for event in events {
        emit_vevent(&mut ical, event, tz, now);
    }

    ical.push_str("END:VCALENDAR");
    ical.push_str(EOL);

    fold(&ical)
}

fn emit_vevent(out: &mut String, event: &Event, tz: Tz, now: DateTime<Utc>) {
    let mut push = |line: String| {
        out.push_str(&line);
        out.push_str(EOL);
    };

    push("BEGIN:VEVENT".into());
    push(format!("UID:{}", escape(&event.uid)));
    let stamp = if event.changed > DateTime::<Utc>::MIN_UTC {
        event.changed
    } else {
        now
    };
    push(format!("DTSTAMP:{}", format_utc(stamp)));

    if event.allday {
        let start_date = event.start.with_timezone(&tz).date_naive();
        // DATE form with an exclusive end on the next day
        push(format!("DTSTART;VALUE=DATE:{}", start_date.format("%Y%m%d")));
        push(format!(
            "DTEND;VALUE=DATE:{}",
            (start_date + Duration::days(1)).format("%Y%m%d")
        ));
    } else {
        push(format!("DTSTART:{}", format_utc(event.start)));
        push(format!("DTEND:{}", format_utc(event.end)));
    }

    push(format!("SUMMARY:{}", escape(&event.title)));
    push(format!("DESCRIPTION:{}", escape(&event.description)));

    for attendee in &event.attendees {
        if attendee.role == AttendeeRole::Organizer {
            let cn = if attendee.name.is_empty() {
                String::new()
            } else {
                format!("CN=\"{}\"", attendee.name)
            };
            push(format!("ORGANIZER;{}:mailto:{}", cn, attendee.email));
        } else {
            let mut line = format!(
                "ATTENDEE;ROLE={};PARTSTAT={}",
                attendee.role, attendee.status
            );
            if !attendee.name.is_empty() {
                line.push_str(&format!(";CN=\"{}\"", attendee.name));
            }
            line.push_str(&format!(":mailto:{}", attendee.email));
            push(line);
        }
    }

    if !event.location.is_empty() {
        push(format!("LOCATION:{}", escape(&event.location)));
    }

    if let Some(rule) = &event.recurrence {
        push(format!("RRULE:{}", rrule_text(rule)));
        if !rule.exdates.is_empty() {
            let joined = rule
                .exdates
                .iter()
                .map(|d| format_utc(*d))
                .collect::<Vec<_>>()
                .join(",");
            push(format!("EXDATE:{}", joined));
        }
    }

    if !event.categories.is_empty() {
        push(format!(
            "CATEGORIES:{}",
            escape(&event.categories.to_uppercase())
        ));
    }

    match event.sensitivity {
        Sensitivity::Public => {}
        Sensitivity::Private => push("CLASS:PRIVATE".into()),
        Sensitivity::Confidential => push("CLASS:CONFIDENTIAL".into()),
    }

    if let Some(alarm) = &event.alarm {
        push("BEGIN:VALARM".into());
        match alarm.trigger {
            almanac_domain::AlarmTrigger::Offset { amount, unit } => {
                let duration = match unit {
                    almanac_domain::OffsetUnit::Minutes => format!("PT{}M", amount.abs()),
                    almanac_domain::OffsetUnit::Hours => format!("PT{}H", amount.abs()),
                    almanac_domain::OffsetUnit::Days => format!("P{}D", amount.abs()),
                };
                if amount > 0 {
                    // trailing offsets are anchored to the event end
                    push(format!("TRIGGER;RELATED=END:{}", duration));
                } else {
                    push(format!("TRIGGER:-{}", duration));
                }
            }
            almanac_domain::AlarmTrigger::Absolute(at) => {
                push(format!("TRIGGER;VALUE=DATE-TIME:{}", format_utc(at)));
            }
        }
        push(format!("ACTION:{}", alarm.action));
        push("END:VALARM".into());
    }

    push(format!(
        "TRANSP:{}",
        if event.free_busy == FreeBusy::Free {
            "TRANSPARENT"
        } else {
            "OPAQUE"
        }
    ));
    if event.free_busy == FreeBusy::Tentative {
        push("STATUS:TENTATIVE".into());
    }

    push("END:VEVENT".into());
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

fn rrule_text(rule: &RecurrenceRule) -> String {
    let mut parts = vec![
        format!("FREQ={}", rule.freq),
        format!("INTERVAL={}", rule.interval),
    ];
    if let Some(count) = rule.count {
        parts.push(format!("COUNT={}", count));
    }
    if let Some(until) = rule.until {
        parts.push(format!("UNTIL={}", format_utc(until)));
    }
    if !rule.byday.is_empty() {
        parts.push(format!(
            "BYDAY={}",
            rule.byday
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",")
        ));
    }
    if !rule.bymonth.is_empty() {
        parts.push(format!(
            "BYMONTH={}",
            rule.bymonth
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(",")
        ));
    }
    parts.join(";")
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            ':' => out.push_str("\\:"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Folds content lines to 75 octets, continuation lines prefixed with a
/// single space.
fn fold(text: &str) -> String {
    text.split(EOL)
        .map(fold_line)
        .collect::<Vec<_>>()
        .join(EOL)
}

fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut used = 0;
    for c in line.chars() {
        let octets = c.len_utf8();
        if used + octets > MAX_LINE_OCTETS {
            out.push_str(EOL);
            // the continuation space counts toward the next line's octets
            out.push(' ');
            used = 1;
        }
        out.push(c);
        used += octets;
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use almanac_domain::Frequency;
    use chrono_tz::UTC;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn wrap_vevent(body: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\n{}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            body
        )
    }

    #[test]
    fn all_day_import_and_export_round_trip() {
        let now = utc(2024, 1, 1, 0, 0);
        let input = wrap_vevent(
            "UID:allday1\r\nSUMMARY:Holiday\r\nDTSTART;VALUE=DATE:20240315\r\nDTEND;VALUE=DATE:20240316",
        );
        let events = import(&input, UTC, now);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.allday);
        assert_eq!(event.start, utc(2024, 3, 15, 0, 0));
        assert_eq!(event.end, event.start + Duration::hours(1));

        let exported = export(std::slice::from_ref(event), None, UTC, now);
        assert!(exported.contains("DTSTART;VALUE=DATE:20240315\r\n"));
        assert!(exported.contains("DTEND;VALUE=DATE:20240316\r\n"));
    }

    #[test]
    fn organizer_is_merged_into_attendees() {
        let now = utc(2024, 1, 1, 0, 0);
        let input = wrap_vevent(
            "UID:org1\r\nSUMMARY:Meeting\r\nDTSTART:20240315T100000Z\r\nDTEND:20240315T110000Z\r\n\
             ORGANIZER;CN=\"Jane Doe\":mailto:jane@example.com\r\n\
             ATTENDEE;ROLE=REQ-PARTICIPANT;PARTSTAT=ACCEPTED;CN=\"Bob\":mailto:bob@example.com",
        );
        let events = import(&input, UTC, now);
        let attendees = &events[0].attendees;
        assert_eq!(attendees.len(), 2);
        assert_eq!(attendees[0].role, AttendeeRole::Organizer);
        assert_eq!(attendees[0].email, "jane@example.com");
        assert_eq!(attendees[1].email, "bob@example.com");
    }

    #[test]
    fn maps_transp_class_and_priority() {
        let now = utc(2024, 1, 1, 0, 0);
        let input = wrap_vevent(
            "UID:m1\r\nSUMMARY:X\r\nDTSTART:20240315T100000Z\r\nDTEND:20240315T110000Z\r\n\
             TRANSP:TRANSPARENT\r\nCLASS:CONFIDENTIAL\r\nPRIORITY:3",
        );
        let event = &import(&input, UTC, now)[0];
        assert_eq!(event.free_busy, FreeBusy::Free);
        assert_eq!(event.sensitivity, Sensitivity::Confidential);
        assert_eq!(event.priority, 2);
    }

    #[test]
    fn preserves_exdates_on_import() {
        let now = utc(2024, 1, 1, 0, 0);
        let input = wrap_vevent(
            "UID:r1\r\nSUMMARY:Weekly\r\nDTSTART:20240101T090000Z\r\nDTEND:20240101T100000Z\r\n\
             RRULE:FREQ=WEEKLY;INTERVAL=1\r\nEXDATE:20240115T090000Z",
        );
        let event = &import(&input, UTC, now)[0];
        let rule = event.recurrence.as_ref().unwrap();
        assert_eq!(rule.freq, Frequency::Weekly);
        assert_eq!(rule.exdates, vec![utc(2024, 1, 15, 9, 0)]);
    }

    #[test]
    fn synthesizes_missing_uid() {
        let now = utc(2024, 1, 1, 0, 0);
        let input =
            wrap_vevent("SUMMARY:NoUid\r\nDTSTART:20240315T100000Z\r\nDTEND:20240315T110000Z");
        let event = &import(&input, UTC, now)[0];
        assert!(!event.uid.is_empty());
    }

    #[test]
    fn rrule_until_date_only_is_accepted() {
        let now = utc(2024, 1, 1, 0, 0);
        let input = wrap_vevent(
            "UID:u1\r\nSUMMARY:X\r\nDTSTART:20240101T090000Z\r\nDTEND:20240101T100000Z\r\n\
             RRULE:FREQ=DAILY;UNTIL=20240110",
        );
        let event = &import(&input, UTC, now)[0];
        assert_eq!(
            event.recurrence.as_ref().unwrap().until,
            Some(utc(2024, 1, 10, 0, 0))
        );
    }

    #[test]
    fn escaping_round_trip() {
        let now = utc(2024, 1, 1, 0, 0);
        let mut event = Event::new(
            "esc1",
            CalendarId::new("c"),
            utc(2024, 3, 15, 10, 0),
            utc(2024, 3, 15, 11, 0),
            now,
        );
        event.title = "Lunch; with friends, at 12:00".into();
        event.description = "line one\nline two".into();

        let exported = export(&[event.clone()], None, UTC, now);
        assert!(exported.contains("SUMMARY:Lunch\\; with friends\\, at 12\\:00"));

        let back = import(&exported, UTC, now);
        assert_eq!(back[0].title, event.title);
        assert_eq!(back[0].description, event.description);
    }

    #[test]
    fn long_lines_fold_to_75_octets_and_unfold_back() {
        let now = utc(2024, 1, 1, 0, 0);
        let mut event = Event::new(
            "fold1",
            CalendarId::new("c"),
            utc(2024, 3, 15, 10, 0),
            utc(2024, 3, 15, 11, 0),
            now,
        );
        event.title = "A very long summary ".repeat(10).trim_end().to_string();

        let exported = export(&[event.clone()], None, UTC, now);
        for line in exported.split("\r\n") {
            assert!(line.len() <= 75, "line too long: {:?}", line);
        }

        let back = import(&exported, UTC, now);
        assert_eq!(back[0].title, event.title);
    }

    #[test]
    fn exports_valarm_block() {
        let now = utc(2024, 1, 1, 0, 0);
        let mut event = Event::new(
            "al1",
            CalendarId::new("c"),
            utc(2024, 3, 15, 10, 0),
            utc(2024, 3, 15, 11, 0),
            now,
        );
        event.alarm = Some("-15M:DISPLAY".parse().unwrap());
        let exported = export(&[event], None, UTC, now);
        assert!(exported.contains("BEGIN:VALARM\r\nTRIGGER:-PT15M\r\nACTION:DISPLAY\r\nEND:VALARM"));
    }

    #[test]
    fn export_emits_method_and_rrule() {
        let now = utc(2024, 1, 1, 0, 0);
        let mut event = Event::new(
            "rr1",
            CalendarId::new("c"),
            utc(2024, 1, 1, 9, 0),
            utc(2024, 1, 1, 10, 0),
            now,
        );
        event.recurrence = Some(RecurrenceRule {
            freq: Frequency::Weekly,
            count: Some(4),
            ..Default::default()
        });
        let exported = export(&[event], Some("request"), UTC, now);
        assert!(exported.contains("METHOD:REQUEST\r\n"));
        assert!(exported.contains("RRULE:FREQ=WEEKLY;INTERVAL=1;COUNT=4\r\n"));
    }
}
