use chrono::{DateTime, Utc};
use icalendar::parser::{self, read_calendar, unfold};

use crate::{Calendar, Component, Event, ParseError, Property};

const DTSTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Deepest component nesting accepted, counting `VCALENDAR` itself.
pub(crate) const MAX_DEPTH: usize = 16;

/// Parses calendar text and stamps every event lacking a `DTSTAMP` with the
/// current time.
pub fn parse_calendar<S: AsRef<str>>(s: S) -> Result<Calendar, ParseError> {
    parse_calendar_at(s, Utc::now())
}

/// Same as [`parse_calendar`], with the instant used for missing `DTSTAMP`s
/// supplied by the caller.
pub fn parse_calendar_at<S: AsRef<str>>(s: S, now: DateTime<Utc>) -> Result<Calendar, ParseError> {
    let unfolded = unfold(s.as_ref().trim_start_matches('\u{feff}'));
    let outline = Outline::scan(&unfolded)?;

    let parsed = read_calendar(&outline.text).map_err(|err| ParseError::Syntax {
        reason: err.to_string(),
    })?;

    let mut calendar = build_calendar(parsed, &outline.children)?;
    stamp_missing_dtstamps(&mut calendar, now);

    tracing::trace!(events = calendar.events.len(), "parsed calendar");

    Ok(calendar)
}

/// The `BEGIN`/`END` skeleton of a calendar, checked before the text reaches
/// `read_calendar`, which recurses once per nesting level.
struct Outline {
    /// Non-blank logical lines, LF terminated.
    text: String,
    /// Line number of every component directly inside `VCALENDAR`.
    children: Vec<usize>,
}

impl Outline {
    fn scan(unfolded: &str) -> Result<Self, ParseError> {
        let mut text = String::with_capacity(unfolded.len());
        let mut children = Vec::new();
        let mut open: Vec<String> = Vec::new();
        let mut seen = false;
        let mut closed = false;

        for (idx, raw) in unfolded.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let number = idx + 1;

            if line.trim().is_empty() {
                continue;
            }
            if closed {
                return Err(ParseError::TrailingContent { line: number });
            }
            if line.contains('\r') {
                return Err(ParseError::LineBreak { line: number });
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ParseError::MalformedLine { line: number });
            };
            let is_begin = name.eq_ignore_ascii_case("BEGIN");

            if !seen && !(is_begin && value.eq_ignore_ascii_case("VCALENDAR")) {
                return Err(ParseError::MissingCalendar { line: number });
            }
            seen = true;

            if is_begin {
                if open.len() == MAX_DEPTH {
                    return Err(ParseError::TooDeep { line: number });
                }
                if open.len() == 1 {
                    children.push(number);
                }
                open.push(value.to_ascii_uppercase());
            } else if name.eq_ignore_ascii_case("END") {
                let found = value.to_ascii_uppercase();
                match open.pop() {
                    Some(expected) if expected == found => closed = open.is_empty(),
                    Some(expected) => {
                        return Err(ParseError::MismatchedEnd {
                            line: number,
                            expected,
                            found,
                        })
                    }
                    None => return Err(ParseError::TrailingContent { line: number }),
                }
            }

            text.push_str(line);
            text.push('\n');
        }

        if !seen {
            return Err(ParseError::Empty);
        }
        if let Some(component) = open.pop() {
            return Err(ParseError::Unterminated { component });
        }

        Ok(Self { text, children })
    }
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Unwraps `VCALENDAR` when `read_calendar` returns it as the only component
/// instead of its contents.
fn into_root<'a>(
    mut parsed: parser::Calendar<'a>,
) -> (Vec<parser::Property<'a>>, Vec<parser::Component<'a>>) {
    let wrapped = parsed.properties.is_empty()
        && parsed.components.len() == 1
        && parsed.components[0]
            .name
            .to_string()
            .eq_ignore_ascii_case("VCALENDAR");

    if wrapped {
        let root = parsed.components.remove(0);
        (root.properties, root.components)
    } else {
        (parsed.properties, parsed.components)
    }
}

fn build_calendar(parsed: parser::Calendar<'_>, lines: &[usize]) -> Result<Calendar, ParseError> {
    let (properties, components) = into_root(parsed);
    let mut calendar = Calendar::new();

    for property in properties {
        let property = convert_property(property)?;

        match property.name.as_str() {
            "PRODID" => calendar.prod_id = Some(property.value),
            "VERSION" => calendar.version = Some(property.value),
            "CALSCALE" => calendar.cal_scale = Some(property.value),
            "METHOD" => calendar.method = Some(property.value),
            _ => calendar.properties.push(property),
        }
    }

    for (idx, component) in components.into_iter().enumerate() {
        let component = convert_component(component)?;

        if component.is("VEVENT") {
            let line = lines.get(idx).copied().unwrap_or_default();
            calendar.events.push(build_event(component, line)?);
        } else {
            calendar.components.push(component);
        }
    }

    Ok(calendar)
}

fn build_event(component: Component, line: usize) -> Result<Event, ParseError> {
    let mut uid = None;
    let mut dtstamp = None;
    let mut properties = Vec::new();

    for property in component.properties {
        match property.name.as_str() {
            "UID" if uid.is_none() => uid = Some(property.value),
            "DTSTAMP" if dtstamp.is_none() => dtstamp = Some(property.value),
            _ => properties.push(property),
        }
    }

    let Some(uid) = uid.filter(|uid| !uid.is_empty()) else {
        return Err(ParseError::MissingUid { line });
    };

    Ok(Event {
        uid,
        dtstamp,
        properties,
        components: component.components,
    })
}

fn convert_component(raw: parser::Component<'_>) -> Result<Component, ParseError> {
    Ok(Component {
        name: raw.name.to_string().to_ascii_uppercase(),
        properties: raw
            .properties
            .into_iter()
            .map(convert_property)
            .collect::<Result<_, _>>()?,
        components: raw
            .components
            .into_iter()
            .map(convert_component)
            .collect::<Result<_, _>>()?,
    })
}

fn convert_property(raw: parser::Property<'_>) -> Result<Property, ParseError> {
    let params = raw
        .params
        .into_iter()
        .map(|param| -> Result<(String, String), ParseError> {
            let value = param
                .val
                .map(|value| unquote(value.to_string()))
                .unwrap_or_default();
            Ok((checked_name(param.key.to_string())?, value))
        })
        .collect::<Result<_, _>>()?;

    Ok(Property {
        name: checked_name(raw.name.to_string())?,
        params,
        value: raw.val.to_string(),
    })
}

fn checked_name(name: String) -> Result<String, ParseError> {
    if is_valid_name(&name) {
        Ok(name.to_ascii_uppercase())
    } else {
        Err(ParseError::InvalidName { name })
    }
}

fn unquote(value: String) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value
    }
}

fn stamp_missing_dtstamps(calendar: &mut Calendar, now: DateTime<Utc>) {
    let stamp = now.format(DTSTAMP_FORMAT).to_string();
    let mut stamped = 0;

    for event in calendar.events.iter_mut().filter(|event| event.dtstamp.is_none()) {
        event.dtstamp = Some(stamp.clone());
        stamped += 1;
    }

    if stamped > 0 {
        tracing::debug!(stamped, %stamp, "synthesized missing DTSTAMP values");
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    const SINGLE_EVENT: &str = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nUID:event1@example.com\nSUMMARY:Test Event\nDTSTART:20230901T120000Z\nDTEND:20230901T130000Z\nEND:VEVENT\nEND:VCALENDAR";

    #[test]
    fn parses_single_event() {
        let calendar = parse_calendar_at(SINGLE_EVENT, noon()).unwrap();

        assert_eq!(calendar.version.as_deref(), Some("2.0"));
        assert_eq!(calendar.prod_id, None);
        assert_eq!(calendar.events.len(), 1);

        let event = &calendar.events[0];
        assert_eq!(event.uid, "event1@example.com");
        assert_eq!(event.property("SUMMARY").unwrap().value, "Test Event");
        assert_eq!(event.property("dtstart").unwrap().value, "20230901T120000Z");
    }

    #[test]
    fn synthesizes_missing_dtstamp() {
        let calendar = parse_calendar_at(SINGLE_EVENT, noon()).unwrap();
        assert_eq!(calendar.events[0].dtstamp.as_deref(), Some("20240301T120000Z"));
    }

    #[test]
    fn keeps_existing_dtstamp() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTAMP:20200101T000000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:b\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let calendar = parse_calendar_at(text, noon()).unwrap();

        assert_eq!(calendar.events[0].dtstamp.as_deref(), Some("20200101T000000Z"));
        assert_eq!(calendar.events[1].dtstamp.as_deref(), Some("20240301T120000Z"));
        assert!(calendar.events[0].properties.is_empty());
    }

    #[test]
    fn parse_calendar_uses_current_time() {
        let before = Utc::now().format(DTSTAMP_FORMAT).to_string();
        let calendar = parse_calendar(SINGLE_EVENT).unwrap();
        let after = Utc::now().format(DTSTAMP_FORMAT).to_string();

        let stamp = calendar.events[0].dtstamp.clone().unwrap();
        assert!(before <= stamp && stamp <= after);
    }

    #[test]
    fn empty_calendar_is_valid() {
        let calendar = parse_calendar_at("BEGIN:VCALENDAR\nVERSION:2.0\nEND:VCALENDAR", noon()).unwrap();
        assert!(calendar.events.is_empty());
    }

    #[test]
    fn unfolds_continuation_lines() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:folded\r\nDESCRIPTION:This is a lo\r\n ng description\r\n that spans lines\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let calendar = parse_calendar_at(text, noon()).unwrap();

        assert_eq!(
            calendar.events[0].property("DESCRIPTION").unwrap().value,
            "This is a long descriptionthat spans lines"
        );
    }

    #[test]
    fn reads_parameters_without_quotes() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:p\nDTSTART;TZID=Europe/Berlin:20240301T090000\nATTENDEE;CN=\"Doe; Jane: PhD\";ROLE=REQ-PARTICIPANT:mailto:jane@example.com\nEND:VEVENT\nEND:VCALENDAR";
        let calendar = parse_calendar_at(text, noon()).unwrap();
        let event = &calendar.events[0];

        let start = event.property("DTSTART").unwrap();
        assert_eq!(start.param("tzid"), Some("Europe/Berlin"));
        assert_eq!(start.value, "20240301T090000");

        let attendee = event.property("ATTENDEE").unwrap();
        assert_eq!(attendee.param("CN"), Some("Doe; Jane: PhD"));
        assert_eq!(attendee.param("ROLE"), Some("REQ-PARTICIPANT"));
        assert_eq!(attendee.value, "mailto:jane@example.com");
    }

    #[test]
    fn keeps_nested_and_sibling_components() {
        let text = "BEGIN:VCALENDAR\nX-WR-CALNAME:Team\nBEGIN:VTIMEZONE\nTZID:Europe/Berlin\nBEGIN:STANDARD\nTZOFFSETFROM:+0200\nTZOFFSETTO:+0100\nEND:STANDARD\nEND:VTIMEZONE\nBEGIN:VEVENT\nUID:alarm\nBEGIN:VALARM\nACTION:DISPLAY\nTRIGGER:-PT15M\nEND:VALARM\nEND:VEVENT\nEND:VCALENDAR";
        let calendar = parse_calendar_at(text, noon()).unwrap();

        assert_eq!(calendar.properties, vec![Property::new("X-WR-CALNAME", "Team")]);
        assert_eq!(calendar.timezones().count(), 1);
        assert_eq!(calendar.components[0].components[0].name, "STANDARD");

        let alarm = &calendar.events[0].components[0];
        assert_eq!(alarm.name, "VALARM");
        assert_eq!(alarm.property("TRIGGER").unwrap().value, "-PT15M");
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse_calendar_at("", noon()), Err(ParseError::Empty));
        assert_eq!(parse_calendar_at("\r\n\r\n", noon()), Err(ParseError::Empty));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            parse_calendar_at("<html><body>Not found</body></html>", noon()),
            Err(ParseError::MalformedLine { line: 1 })
        );
        assert_eq!(
            parse_calendar_at("HELLO:world", noon()),
            Err(ParseError::MissingCalendar { line: 1 })
        );
    }

    #[test]
    fn rejects_truncated_calendar() {
        let truncated = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nUID:cut";
        assert_eq!(
            parse_calendar_at(truncated, noon()),
            Err(ParseError::Unterminated {
                component: "VEVENT".to_string()
            })
        );
    }

    #[test]
    fn rejects_mismatched_end() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\nEND:VTODO\nEND:VCALENDAR";
        assert_eq!(
            parse_calendar_at(text, noon()),
            Err(ParseError::MismatchedEnd {
                line: 4,
                expected: "VEVENT".to_string(),
                found: "VTODO".to_string()
            })
        );
    }

    #[test]
    fn rejects_trailing_content() {
        let text = "BEGIN:VCALENDAR\nEND:VCALENDAR\nBEGIN:VCALENDAR\nEND:VCALENDAR";
        assert_eq!(
            parse_calendar_at(text, noon()),
            Err(ParseError::TrailingContent { line: 3 })
        );
    }

    #[test]
    fn rejects_event_without_uid() {
        let text = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nSUMMARY:Anonymous\nEND:VEVENT\nEND:VCALENDAR";
        assert_eq!(
            parse_calendar_at(text, noon()),
            Err(ParseError::MissingUid { line: 3 })
        );
    }

    #[test]
    fn rejects_bare_carriage_return() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:cr\r\nSUMMARY:one\rtwo\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert_eq!(
            parse_calendar_at(text, noon()),
            Err(ParseError::LineBreak { line: 4 })
        );
    }

    fn nested(depth: usize) -> String {
        let mut text = String::from("BEGIN:VCALENDAR\n");
        text.push_str(&"BEGIN:X\n".repeat(depth));
        text.push_str(&"END:X\n".repeat(depth));
        text.push_str("END:VCALENDAR\n");
        text
    }

    #[test]
    fn accepts_nesting_up_to_the_limit() {
        let calendar = parse_calendar_at(nested(MAX_DEPTH - 1), noon()).unwrap();
        assert_eq!(calendar.components.len(), 1);
    }

    #[test]
    fn rejects_deep_nesting_on_a_small_stack() {
        let text = nested(20_000);

        let result = thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || parse_calendar_at(text, noon()))
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(result, Err(ParseError::TooDeep { line: MAX_DEPTH + 1 }));
    }
}
