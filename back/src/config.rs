//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::error::MonitorError;

pub const DEFAULT_LISTING_URL: &str = "https://www.firstcry.com/hotwheels/5/0/113?sort=popularity&q=ard-hotwheels&ref2=q_ard_hotwheels&asid=53241";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Render the page in headless Chrome over WebDriver.
    Browser,
    /// Fetch the raw HTML over HTTP.
    Http,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "stockwatch", about = "Watches a product listing for new and restocked items")]
pub struct Cli {
    /// Listing page to watch
    #[arg(long, env = "STOCKWATCH_URL", default_value = DEFAULT_LISTING_URL)]
    pub url: String,

    /// How snapshots are acquired
    #[arg(long, env = "STOCKWATCH_SOURCE", value_enum, default_value_t = SourceKind::Browser)]
    pub source: SourceKind,

    /// WebDriver endpoint used by the browser source
    #[arg(long, env = "STOCKWATCH_WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Seconds between scheduled cycles
    #[arg(long, env = "STOCKWATCH_INTERVAL", default_value_t = 60)]
    pub interval_secs: u64,

    /// Seconds before a cycle is abandoned
    #[arg(long, env = "STOCKWATCH_TIMEOUT", default_value_t = 25)]
    pub timeout_secs: u64,

    /// Address for the state API
    #[arg(long, env = "STOCKWATCH_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Run a single cycle, print the state as JSON and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub url: Url,
    pub source: SourceKind,
    pub webdriver_url: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub bind: SocketAddr,
    pub once: bool,
}

impl TryFrom<Cli> for MonitorConfig {
    type Error = MonitorError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let url = Url::parse(&cli.url).map_err(|source| MonitorError::InvalidUrl {
            url: cli.url.clone(),
            source,
        })?;

        Ok(Self {
            url,
            source: cli.source,
            webdriver_url: cli.webdriver_url,
            interval: Duration::from_secs(cli.interval_secs.max(1)),
            timeout: Duration::from_secs(cli.timeout_secs.max(1)),
            bind: cli.bind,
            once: cli.once,
        })
    }
}
