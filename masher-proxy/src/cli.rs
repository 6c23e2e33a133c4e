use std::process;

use getopts::{Fail, Options};

/// Raw command line values. Validation happens in [`crate::Config`], where
/// they are merged with the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub urls: Vec<String>,
    pub address: Option<String>,
    pub fetch_timeout: Option<String>,
    pub max_concurrency: Option<String>,
    pub skip_failed_feeds: bool,
    pub json_logs: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(Args),
    Help(String),
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "a",
        "address",
        "Socket address (IP and port) to listen on [Default: 127.0.0.1:8080]",
        "SOCKET_ADDRESS",
    );
    opts.optopt(
        "t",
        "fetch-timeout",
        "Timeout for fetching a single feed [Default: 10]",
        "SECONDS",
    );
    opts.optopt(
        "c",
        "max-concurrency",
        "Maximum number of feeds fetched at the same time [Default: 8]",
        "COUNT",
    );
    opts.optflag(
        "s",
        "skip-failed-feeds",
        "Serve the remaining feeds when some of them fail instead of failing the request",
    );
    opts.optflag("j", "json-logs", "Log as JSON instead of human-readable text");
    opts
}

/// Parses arguments without the program name. Free arguments are feed URLs.
pub fn try_parse(args: Vec<String>) -> Result<Command, Fail> {
    let opts = opts();
    let matches = opts.parse(args)?;

    if matches.opt_present("help") {
        let brief = format!(
            "{} [options] [URL...]\n\nFeed URLs default to the comma-separated ICS_URLS environment variable.",
            opts.short_usage(env!("CARGO_PKG_NAME"))
        );
        return Ok(Command::Help(opts.usage(&brief)));
    }

    Ok(Command::Run(Args {
        urls: matches.free.clone(),
        address: matches.opt_str("address"),
        fetch_timeout: matches.opt_str("fetch-timeout"),
        max_concurrency: matches.opt_str("max-concurrency"),
        skip_failed_feeds: matches.opt_present("skip-failed-feeds"),
        json_logs: matches.opt_present("json-logs"),
    }))
}

pub fn parse(args: Vec<String>) -> Args {
    match try_parse(args) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help(usage)) => {
            println!("{usage}");
            process::exit(0);
        }
        Err(fail) => {
            eprintln!("{fail}");
            process::exit(1);
        }
    }
}
