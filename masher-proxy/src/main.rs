use std::{env, process};

use masher_proxy::{cli, logging, server, Combiner, Config};

#[tokio::main]
async fn main() {
    let args = cli::parse(env::args().skip(1).collect());

    let config = match Config::from_env(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    if let Err(err) = logging::init(config.log_format) {
        eprintln!("{err}");
        process::exit(1);
    }

    let combiner = match Combiner::from_config(&config) {
        Ok(combiner) => combiner,
        Err(err) => {
            tracing::error!(error = %err, "failed to build HTTP client");
            process::exit(1);
        }
    };

    tracing::info!(
        feeds = config.urls.len(),
        fetch_timeout = ?config.fetch_timeout,
        max_concurrency = config.max_concurrency,
        on_feed_error = ?config.on_feed_error,
        "starting"
    );

    let router = server::router(combiner, config.urls);

    if let Err(err) = server::serve(config.address, router).await {
        tracing::error!(error = %err, "server error");
        process::exit(1);
    }
}
