use std::io;

use thiserror::Error;

/// Why a feed could not be read. Line numbers count logical lines, after
/// folded lines have been joined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("calendar text is empty")]
    Empty,
    #[error("line {line}: malformed content line")]
    MalformedLine { line: usize },
    #[error("line {line}: bare carriage return inside a content line")]
    LineBreak { line: usize },
    #[error("line {line}: expected BEGIN:VCALENDAR")]
    MissingCalendar { line: usize },
    #[error("line {line}: END:{found} does not close BEGIN:{expected}")]
    MismatchedEnd {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("missing END:{component}")]
    Unterminated { component: String },
    #[error("line {line}: components are nested too deeply")]
    TooDeep { line: usize },
    #[error("line {line}: unexpected content after END:VCALENDAR")]
    TrailingContent { line: usize },
    #[error("{name:?} is not a valid property or parameter name")]
    InvalidName { name: String },
    #[error("line {line}: event has no UID")]
    MissingUid { line: usize },
    #[error("invalid calendar: {reason}")]
    Syntax { reason: String },
}

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("event {uid} has no DTSTAMP")]
    MissingDtstamp { uid: String },
    #[error("{name:?} is not a valid property or parameter name")]
    InvalidName { name: String },
    #[error("value of {name} contains a line break")]
    LineBreak { name: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}
