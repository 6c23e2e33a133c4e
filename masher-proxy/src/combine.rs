use std::sync::Arc;

use futures::future;
use masher_calendar::{merge_calendars, parse_calendar, Calendar};
use tokio::{sync::Semaphore, task};
use tracing::{debug, error, info, warn};

use crate::error::report;
use crate::{CombineError, Config, FeedErrorPolicy, Fetcher, Response};

/// Fetches a list of feeds concurrently and folds them into one calendar.
///
/// Holds no per-request state; the concurrency limit is created fresh for
/// every call.
#[derive(Debug, Clone)]
pub struct Combiner {
    fetcher: Fetcher,
    max_concurrency: usize,
    policy: FeedErrorPolicy,
}

impl Combiner {
    pub fn new(fetcher: Fetcher, max_concurrency: usize, policy: FeedErrorPolicy) -> Self {
        Self {
            fetcher,
            max_concurrency: max_concurrency.max(1),
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            Fetcher::new(config.fetch_timeout)?,
            config.max_concurrency,
            config.on_feed_error,
        ))
    }

    /// Combines the feeds into a ready-to-send response. Failures are logged
    /// with full detail and answered with a generic 500.
    #[tracing::instrument(skip_all, fields(feeds = urls.len()))]
    pub async fn combine(&self, urls: &[String]) -> Response {
        respond(self.try_combine(urls).await)
    }

    pub async fn try_combine(&self, urls: &[String]) -> Result<String, CombineError> {
        render(self.collect(urls).await?)
    }

    /// Runs one task per URL and returns the parsed calendars in URL order,
    /// however the tasks happen to finish.
    async fn collect(&self, urls: &[String]) -> Result<Vec<Calendar>, CombineError> {
        let limit = Arc::new(Semaphore::new(self.max_concurrency));

        let handles: Vec<_> = urls
            .iter()
            .map(|url| {
                let fetcher = self.fetcher.clone();
                let limit = Arc::clone(&limit);
                let url = url.clone();
                task::spawn(async move { fetch_calendar(&fetcher, &limit, &url).await })
            })
            .collect();

        // join_all keeps one slot per handle, in the order the handles were given
        let slots = future::join_all(handles).await;

        let mut calendars = Vec::with_capacity(slots.len());
        let mut first_error = None;

        for (url, slot) in urls.iter().zip(slots) {
            let result = slot
                .map_err(|source| CombineError::Task {
                    url: url.clone(),
                    source,
                })
                .and_then(|result| result);

            match result {
                Ok(calendar) => calendars.push(calendar),
                Err(err) => {
                    warn!(%url, error = %report(&err), "feed failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match (first_error, self.policy) {
            (None, _) => Ok(calendars),
            (Some(err), FeedErrorPolicy::Fail) => Err(err),
            (Some(_), FeedErrorPolicy::Skip) if calendars.is_empty() => Err(CombineError::NoFeeds),
            (Some(_), FeedErrorPolicy::Skip) => {
                info!(
                    skipped = urls.len() - calendars.len(),
                    "serving remaining feeds"
                );
                Ok(calendars)
            }
        }
    }
}

fn render(calendars: Vec<Calendar>) -> Result<String, CombineError> {
    let merged = merge_calendars(calendars);
    debug!(events = merged.events.len(), "merged calendars");

    Ok(merged.to_ics_string()?)
}

fn respond(result: Result<String, CombineError>) -> Response {
    match result {
        Ok(body) => {
            info!(bytes = body.len(), "combined calendars");
            Response::calendar(body)
        }
        Err(err) => {
            error!(error = %report(&err), "failed to combine calendars");
            Response::internal_error()
        }
    }
}

async fn fetch_calendar(
    fetcher: &Fetcher,
    limit: &Semaphore,
    url: &str,
) -> Result<Calendar, CombineError> {
    let permit = limit
        .acquire()
        .await
        .map_err(|source| CombineError::Limit {
            url: url.to_string(),
            source,
        })?;

    let text = fetcher.fetch(url).await?;
    drop(permit);

    let calendar = parse_calendar(&text).map_err(|source| CombineError::Parse {
        url: url.to_string(),
        source,
    })?;

    debug!(%url, events = calendar.events.len(), "fetched calendar");

    Ok(calendar)
}
