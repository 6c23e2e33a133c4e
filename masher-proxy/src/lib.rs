pub mod cli;
pub mod combine;
pub mod config;
mod error;
pub mod fetch;
pub mod logging;
pub mod response;
pub mod server;

pub use combine::Combiner;
pub use config::{Config, ConfigError, FeedErrorPolicy};
pub use error::{CombineError, FetchError};
pub use fetch::Fetcher;
pub use response::Response;
