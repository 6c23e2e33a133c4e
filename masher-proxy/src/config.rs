use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use reqwest::Url;
use thiserror::Error;

use crate::cli::Args;
use crate::logging::LogFormat;

pub const ICS_URLS: &str = "ICS_URLS";
pub const MASHER_ADDR: &str = "MASHER_ADDR";
pub const MASHER_FETCH_TIMEOUT: &str = "MASHER_FETCH_TIMEOUT";
pub const MASHER_MAX_CONCURRENCY: &str = "MASHER_MAX_CONCURRENCY";
pub const MASHER_ON_FEED_ERROR: &str = "MASHER_ON_FEED_ERROR";
pub const MASHER_LOG_FORMAT: &str = "MASHER_LOG_FORMAT";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// What to do when some, but not all, feeds of a request fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedErrorPolicy {
    /// The whole request fails.
    #[default]
    Fail,
    /// Failed feeds are left out of the combined calendar.
    Skip,
}

impl FromStr for FeedErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown feed error policy {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub urls: Vec<String>,
    pub address: SocketAddr,
    pub fetch_timeout: Duration,
    pub max_concurrency: usize,
    pub on_feed_error: FeedErrorPolicy,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no feed URLs given and environment variable `ICS_URLS` is not set or is empty")]
    MissingUrls,
    #[error("{url:?} is not a valid http(s) URL")]
    InvalidUrl { url: String },
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    /// Merges command line arguments with the process environment. Command
    /// line values win.
    pub fn from_env(args: Args) -> Result<Self, ConfigError> {
        Self::load(args, |name| env::var(name).ok())
    }

    pub fn load<F>(args: Args, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let urls = if args.urls.is_empty() {
            lookup(ICS_URLS).map(|urls| split_urls(&urls)).unwrap_or_default()
        } else {
            args.urls.iter().flat_map(|urls| split_urls(urls)).collect()
        };

        if urls.is_empty() {
            return Err(ConfigError::MissingUrls);
        }

        for url in &urls {
            validate_url(url)?;
        }

        let address = parse_value(
            "address",
            args.address.or_else(|| lookup(MASHER_ADDR)),
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;

        let timeout_raw = args.fetch_timeout.or_else(|| lookup(MASHER_FETCH_TIMEOUT));
        let fetch_timeout = match parse_value(
            "fetch timeout",
            timeout_raw.clone(),
            DEFAULT_FETCH_TIMEOUT_SECS,
        )? {
            0 => return Err(invalid("fetch timeout", timeout_raw)),
            secs => Duration::from_secs(secs),
        };

        let concurrency_raw = args.max_concurrency.or_else(|| lookup(MASHER_MAX_CONCURRENCY));
        let max_concurrency = match parse_value(
            "max concurrency",
            concurrency_raw.clone(),
            DEFAULT_MAX_CONCURRENCY,
        )? {
            0 => return Err(invalid("max concurrency", concurrency_raw)),
            count => count,
        };

        let on_feed_error = if args.skip_failed_feeds {
            FeedErrorPolicy::Skip
        } else {
            parse_value(
                "feed error policy",
                lookup(MASHER_ON_FEED_ERROR),
                FeedErrorPolicy::Fail,
            )?
        };

        let log_format = if args.json_logs {
            LogFormat::Json
        } else {
            parse_value("log format", lookup(MASHER_LOG_FORMAT), LogFormat::Pretty)?
        };

        Ok(Self {
            urls,
            address,
            fetch_timeout,
            max_concurrency,
            on_feed_error,
            log_format,
        })
    }
}

fn split_urls(urls: &str) -> Vec<String> {
    urls.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

fn parse_value<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(invalid(name, Some(value))),
        },
    }
}

fn invalid(name: &'static str, value: Option<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.unwrap_or_default(),
    }
}
