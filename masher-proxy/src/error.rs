use std::error::Error as StdError;

use masher_calendar::{ParseError, SerializeError};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

/// Everything that can make a combine request fail. None of it reaches the
/// client; it is logged and collapsed into a plain 500.
#[derive(Debug, Error)]
pub enum CombineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse calendar from {url}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
    #[error("fetch task for {url} did not finish")]
    Task {
        url: String,
        #[source]
        source: JoinError,
    },
    #[error("concurrency limit closed before {url} could be fetched")]
    Limit {
        url: String,
        #[source]
        source: AcquireError,
    },
    #[error("failed to serialize combined calendar")]
    Serialize(#[from] SerializeError),
    #[error("every feed failed")]
    NoFeeds,
}

/// Renders an error with its whole source chain on one line.
pub(crate) fn report(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
