//! Where snapshots come from: a headless browser through WebDriver, or a
//! plain HTTP fetch for pages that render server side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use thirtyfour::{ChromiumLikeCapabilities, prelude::*};
use url::Url;

use crate::error::{MonitorError, Result};
use crate::parser::parse_listing;
use crate::product::Snapshot;

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces one complete snapshot of the listing at `url`.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn acquire(&self, url: &Url) -> Result<Snapshot>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NAVIGATION_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn acquire(&self, url: &Url) -> Result<Snapshot> {
        let response = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, DESKTOP_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Status {
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        Ok(parse_listing(&html, url))
    }
}

// Flags for a short-lived headless session.
const CHROME_ARGS: &[&str] = &[
    "--autoplay-policy=user-gesture-required",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-domain-reliability",
    "--disable-extensions",
    "--disable-features=AudioServiceOutOfProcess",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-notifications",
    "--disable-popup-blocking",
    "--disable-print-preview",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-setuid-sandbox",
    "--disable-speech-api",
    "--disable-sync",
    "--hide-scrollbars",
    "--metrics-recording-only",
    "--mute-audio",
    "--no-default-browser-check",
    "--no-first-run",
    "--no-pings",
    "--no-sandbox",
    "--no-zygote",
    "--password-store=basic",
    "--use-mock-keychain",
    "--window-size=1920,1080",
];

// Scrolls 300px every 100ms until the bottom or 20 steps, so lazily loaded
// product blocks get rendered.
const AUTO_SCROLL: &str = r#"
const done = arguments[arguments.length - 1];
let total = 0;
let scrolls = 0;
const timer = setInterval(() => {
    const height = document.body.scrollHeight;
    window.scrollBy(0, 300);
    total += 300;
    scrolls += 1;
    if (total >= height || scrolls >= 20) {
        clearInterval(timer);
        done();
    }
}, 100);
"#;

pub struct BrowserSource {
    webdriver_url: String,
}

impl BrowserSource {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }

    async fn open_session(&self) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        for arg in CHROME_ARGS {
            caps.add_arg(arg)?;
        }
        Ok(WebDriver::new(&self.webdriver_url, caps).await?)
    }

    async fn render(&self, driver: &WebDriver, url: &Url) -> Result<String> {
        match tokio::time::timeout(NAVIGATION_TIMEOUT, driver.goto(url.as_str())).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MonitorError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: NAVIGATION_TIMEOUT,
                });
            }
        }

        driver.execute_async(AUTO_SCROLL, Vec::new()).await?;
        Ok(driver.source().await?)
    }
}

#[async_trait]
impl SnapshotSource for BrowserSource {
    async fn acquire(&self, url: &Url) -> Result<Snapshot> {
        let driver = self.open_session().await?;
        let rendered = self.render(&driver, url).await;

        if let Err(e) = driver.quit().await {
            tracing::warn!(error = %e, "failed to close browser session");
        }

        Ok(parse_listing(&rendered?, url))
    }
}
