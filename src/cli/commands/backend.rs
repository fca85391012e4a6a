use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_TIMEOUT_SECONDS: &str = "backend-timeout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .short('b')
                .long(ARG_BACKEND_URL)
                .help("Base URL of the budget backend, e.g. http://localhost:8000")
                .env("ANGGARAN_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_TIMEOUT_SECONDS)
                .long(ARG_BACKEND_TIMEOUT_SECONDS)
                .help("Timeout for each backend call, in seconds")
                .env("ANGGARAN_BACKEND_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the backend URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_BACKEND_URL)
            .cloned()
            .context("missing required argument: --backend-url")?;
        let timeout_seconds = matches
            .get_one::<u64>(ARG_BACKEND_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10);
        Ok(Self {
            url,
            timeout_seconds,
        })
    }
}
