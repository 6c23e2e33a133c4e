use crate::{Calendar, Component};

/// `PRODID` stamped on every combined calendar.
pub const PRODUCT_ID: &str = "-//ics-masher//Combined Calendar//EN";

/// Folds calendars into one, keeping input order.
///
/// Events are concatenated without dedup. Timezone definitions are carried
/// over once per `TZID`, first one wins. Everything else that is specific to a
/// single feed (its name, `METHOD`, other components) is left behind.
pub fn merge_calendars<I>(calendars: I) -> Calendar
where
    I: IntoIterator<Item = Calendar>,
{
    let mut merged = calendars
        .into_iter()
        .fold(Calendar::new(), |mut merged, calendar| {
            for timezone in calendar.components.into_iter().filter(|c| c.is("VTIMEZONE")) {
                if !has_timezone(&merged, &timezone) {
                    merged.components.push(timezone);
                }
            }

            merged.events.extend(calendar.events);
            merged
        });

    merged.prod_id = Some(PRODUCT_ID.to_string());
    merged.with_defaults();
    merged
}

fn has_timezone(calendar: &Calendar, timezone: &Component) -> bool {
    let Some(tzid) = timezone.property("TZID") else {
        return false;
    };

    calendar
        .timezones()
        .filter_map(|existing| existing.property("TZID"))
        .any(|existing| existing.value == tzid.value)
}
