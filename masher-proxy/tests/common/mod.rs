#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use masher_proxy::{Combiner, FeedErrorPolicy, Fetcher};
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}")
}

pub fn combiner(policy: FeedErrorPolicy) -> Combiner {
    combiner_with(Duration::from_secs(5), 8, policy)
}

pub fn combiner_with(timeout: Duration, max_concurrency: usize, policy: FeedErrorPolicy) -> Combiner {
    Combiner::new(Fetcher::new(timeout).unwrap(), max_concurrency, policy)
}

pub fn feed(uids: &[&str]) -> String {
    let events: String = uids
        .iter()
        .map(|uid| {
            format!(
                "BEGIN:VEVENT\nUID:{uid}\nDTSTAMP:20230801T000000Z\nSUMMARY:Event {uid}\nDTSTART:20230901T120000Z\nDTEND:20230901T130000Z\nEND:VEVENT\n"
            )
        })
        .collect();

    format!("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//Upstream//EN\n{events}END:VCALENDAR")
}

pub fn urls(base: &str, paths: &[&str]) -> Vec<String> {
    paths.iter().map(|path| format!("{base}{path}")).collect()
}

pub fn uids(calendar: &masher_calendar::Calendar) -> Vec<&str> {
    calendar.events.iter().map(|event| event.uid.as_str()).collect()
}
