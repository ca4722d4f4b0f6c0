use std::time::Duration;

use thiserror::Error;

/// Failures raised while acquiring a snapshot.
///
/// None of these are fatal to the process; the coordinator turns every one of
/// them into an error status and waits for the next trigger.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("webdriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing request failed with status {status}")]
    Status { status: u16 },

    #[error("invalid listing url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("navigation to {url} did not finish within {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("snapshot task ended without a result")]
    Abandoned,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
