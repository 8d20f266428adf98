use chrono::Utc;
use fantoccini::{Client, ClientBuilder, Locator};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use market_results::error::Result;
use market_results::{MarketDay, ResultTable, ScrapeError, TableExtractor};
use serde_json::{json, Map, Value};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, timeout_at, Instant};

use crate::config::FetchConfig;

/// Limit for the diagnostic and cleanup commands issued after the main wait.
const FOLLOW_UP_LIMIT: Duration = Duration::from_secs(2);

/// Clicks the first visible "Accept"/"Agree" button, if the page shows one.
const ACCEPT_COOKIES_JS: &str = r#"
    const buttons = Array.from(document.querySelectorAll('button'));
    const target = buttons.find(b =>
        /^(accept|agree)/i.test((b.textContent || '').trim()) && b.offsetParent !== null);
    if (target) { target.click(); return true; }
    return false;
"#;

/// The results table is ready once rows are attached and their count holds
/// still across two consecutive polls; the page fills the body in batches.
#[derive(Debug, Default)]
pub struct TableReadiness {
    last: Option<usize>,
}

impl TableReadiness {
    /// Feed one row count; returns true when the table has settled.
    pub fn observe(&mut self, rows: usize) -> bool {
        let settled = rows > 0 && self.last == Some(rows);
        self.last = Some(rows);
        settled
    }

    pub fn last_seen(&self) -> usize {
        self.last.unwrap_or(0)
    }
}

enum WaitOutcome {
    Ready(usize),
    TimedOut { rows: usize },
}

/// Error for a render wait that ran out of time. Only a table that rendered
/// without any rows means the day has no results.
pub fn timeout_error(day: MarketDay, table_present: bool, rows: usize, limit: Duration) -> ScrapeError {
    if table_present && rows == 0 {
        ScrapeError::NoData {
            date: day.date(),
            reason: "results table rendered without rows".to_string(),
        }
    } else if rows > 0 {
        ScrapeError::Fetch(format!(
            "results table still loading after {} ms ({} rows so far)",
            limit.as_millis(),
            rows
        ))
    } else {
        ScrapeError::Fetch(format!(
            "results table did not render within {} ms",
            limit.as_millis()
        ))
    }
}

/// Await one WebDriver command for at most `limit`.
async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    E: Display,
    F: Future<Output = std::result::Result<T, E>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(ScrapeError::Fetch(format!("{} failed: {}", what, e))),
        Err(_) => Err(ScrapeError::Fetch(format!(
            "{} did not respond within {} ms",
            what,
            limit.as_millis()
        ))),
    }
}

/// Drives one WebDriver session per fetch: navigate, wait, read, close.
pub struct PageFetcher {
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub async fn fetch(&self, day: MarketDay) -> Result<ResultTable> {
        let today = Utc::now().date_naive();
        if !day.is_published(today) {
            return Err(ScrapeError::NoData {
                date: day.date(),
                reason: format!("delivery day is in the future (today is {})", today),
            });
        }

        let extractor = TableExtractor::new(&self.config.row_selector)?
            .with_max_fields(self.config.max_fields)
            .with_label_column(self.config.label_column);

        let client = self.connect().await?;
        let result = self.scrape(&client, day, &extractor).await;

        match timeout(FOLLOW_UP_LIMIT, client.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Closing browser session failed: {}", e),
            Err(_) => warn!("Closing browser session timed out"),
        }
        result
    }

    async fn connect(&self) -> Result<Client> {
        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-agent={}", self.config.user_agent),
            "--window-size=1920,1080".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        debug!("Opening WebDriver session at {}", self.config.webdriver_url);
        let what = format!("starting browser session at {}", self.config.webdriver_url);
        bounded(
            self.config.timeout,
            &what,
            ClientBuilder::native()
                .capabilities(caps)
                .connect(&self.config.webdriver_url),
        )
        .await
    }

    async fn scrape(&self, client: &Client, day: MarketDay, extractor: &TableExtractor) -> Result<ResultTable> {
        let url = self.config.results_url(day);
        info!("Navigating to {}", url);

        bounded(self.config.timeout, &format!("navigation to {}", url), client.goto(&url)).await?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Waiting for results table ({})", day));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let outcome = self.wait_for_table(client).await;
        spinner.finish_and_clear();

        match outcome? {
            WaitOutcome::Ready(rows) => info!("Results table ready with {} rows", rows),
            WaitOutcome::TimedOut { rows } => return Err(self.classify_timeout(client, day, rows).await),
        }

        self.accept_cookies(client).await;

        let html = bounded(self.config.timeout, "reading page source", client.source()).await?;

        let table = extractor.extract(&html, day);
        if table.is_empty() {
            return Err(ScrapeError::NoData {
                date: day.date(),
                reason: "results table has no data rows".to_string(),
            });
        }

        info!("Extracted {} valid rows", table.len());
        Ok(table)
    }

    /// Poll the row selector until `TableReadiness` is satisfied or the timeout
    /// expires. Each poll is cut off at the same deadline.
    async fn wait_for_table(&self, client: &Client) -> Result<WaitOutcome> {
        let deadline = Instant::now() + self.config.timeout;
        let mut readiness = TableReadiness::default();

        loop {
            let rows = client.find_all(Locator::Css(&self.config.row_selector));
            let count = match timeout_at(deadline, rows).await {
                Ok(found) => found
                    .map_err(|e| ScrapeError::Fetch(format!("querying results rows failed: {}", e)))?
                    .len(),
                Err(_) => {
                    return Ok(WaitOutcome::TimedOut {
                        rows: readiness.last_seen(),
                    })
                }
            };
            debug!("Results rows attached: {}", count);

            if readiness.observe(count) {
                return Ok(WaitOutcome::Ready(count));
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut {
                    rows: readiness.last_seen(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn classify_timeout(&self, client: &Client, day: MarketDay, rows: usize) -> ScrapeError {
        if let Ok(Ok(html)) = timeout(FOLLOW_UP_LIMIT, client.source()).await {
            let preview: String = html.chars().take(2000).collect();
            debug!("Page HTML snippet:\n{}", preview);
        }

        let table_present = matches!(
            timeout(FOLLOW_UP_LIMIT, client.find_all(Locator::Css(&self.config.table_selector))).await,
            Ok(Ok(found)) if !found.is_empty()
        );

        timeout_error(day, table_present, rows, self.config.timeout)
    }

    async fn accept_cookies(&self, client: &Client) {
        let check = client.execute(ACCEPT_COOKIES_JS, Vec::<Value>::new());
        match bounded(FOLLOW_UP_LIMIT, "cookie banner check", check).await {
            Ok(Value::Bool(true)) => info!("Accepted cookie banner."),
            Ok(_) => debug!("No cookie banner found"),
            Err(e) => debug!("{}", e),
        }
    }
}
