mod error;
mod ics;
mod merge;
mod parser;
mod structs;

pub use error::{ParseError, SerializeError};
pub use merge::{merge_calendars, PRODUCT_ID};
pub use parser::{parse_calendar, parse_calendar_at};
pub use structs::{Calendar, Component, Event, Property};
