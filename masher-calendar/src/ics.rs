use std::borrow::Cow;
use std::io::Write;

use ::ics::components::{Component as IcsComponent, Parameter, Property as IcsProperty};

use crate::parser::is_valid_name;
use crate::{Calendar, Component, Event, Property, SerializeError};

impl Calendar {
    /// Builds the `VCALENDAR` for output. Folding and CRLF line endings are
    /// left to `ics`.
    ///
    /// Every event must carry a `DTSTAMP`; names and values are checked so the
    /// output always parses back into the same calendar.
    pub fn to_ics(&self) -> Result<IcsComponent<'_>, SerializeError> {
        let mut calendar = IcsComponent::new("VCALENDAR");

        for (name, value) in [
            ("PRODID", &self.prod_id),
            ("VERSION", &self.version),
            ("CALSCALE", &self.cal_scale),
            ("METHOD", &self.method),
        ] {
            if let Some(value) = value {
                calendar.add_property(content_line(name, value)?);
            }
        }

        for property in &self.properties {
            calendar.add_property(to_ics_property(property)?);
        }

        for component in &self.components {
            calendar.add_component(to_ics_component(component)?);
        }

        for event in &self.events {
            calendar.add_component(to_ics_event(event)?);
        }

        Ok(calendar)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), SerializeError> {
        let calendar = self.to_ics()?;
        write!(writer, "{calendar}")?;
        writer.flush()?;

        Ok(())
    }

    pub fn to_ics_string(&self) -> Result<String, SerializeError> {
        Ok(self.to_ics()?.to_string())
    }
}

fn to_ics_event(event: &Event) -> Result<IcsComponent<'_>, SerializeError> {
    let Some(dtstamp) = &event.dtstamp else {
        return Err(SerializeError::MissingDtstamp {
            uid: event.uid.clone(),
        });
    };

    let mut component = IcsComponent::new("VEVENT");
    component.add_property(content_line("UID", &event.uid)?);
    component.add_property(content_line("DTSTAMP", dtstamp)?);

    for property in &event.properties {
        component.add_property(to_ics_property(property)?);
    }

    for child in &event.components {
        component.add_component(to_ics_component(child)?);
    }

    Ok(component)
}

fn to_ics_component(component: &Component) -> Result<IcsComponent<'_>, SerializeError> {
    let mut out = IcsComponent::new(checked_name(&component.name)?);

    for property in &component.properties {
        out.add_property(to_ics_property(property)?);
    }

    for child in &component.components {
        out.add_component(to_ics_component(child)?);
    }

    Ok(out)
}

fn to_ics_property(property: &Property) -> Result<IcsProperty<'_>, SerializeError> {
    let name = checked_name(&property.name)?;
    let mut out = content_line(name, &property.value)?;

    for (key, value) in &property.params {
        let key = checked_name(key)?;
        if has_line_break(value) {
            return Err(SerializeError::LineBreak {
                name: format!("{name};{key}"),
            });
        }

        out.add(Parameter::new(key, quoted(value)));
    }

    Ok(out)
}

fn checked_name(name: &str) -> Result<&str, SerializeError> {
    if is_valid_name(name) {
        Ok(name)
    } else {
        Err(SerializeError::InvalidName {
            name: name.to_string(),
        })
    }
}

fn content_line<'a>(name: &'a str, value: &'a str) -> Result<IcsProperty<'a>, SerializeError> {
    if has_line_break(value) {
        return Err(SerializeError::LineBreak {
            name: name.to_string(),
        });
    }

    Ok(IcsProperty::new(name, value))
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

/// Parameter values containing `:`, `;` or `,` go out as quoted strings.
fn quoted(value: &str) -> Cow<'_, str> {
    if value.contains([':', ';', ',']) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Borrowed(value)
    }
}
