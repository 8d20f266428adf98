use clap::ValueEnum;
use market_results::{LabelColumn, MarketDay, ScrapeError, DEFAULT_ROW_SELECTOR};
use std::time::Duration;

pub const RESULTS_URL: &str = "https://www.epexspot.com/en/market-results";
pub const DEFAULT_WEBDRIVER: &str = "http://localhost:9515";
pub const DEFAULT_TABLE_SELECTOR: &str = "table.table-01";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Product lengths (minutes) the results page offers.
pub const PRODUCTS: [u16; 3] = [15, 30, 60];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Modality {
    Continuous,
    Auction,
}

impl Modality {
    pub fn as_query(&self) -> &'static str {
        match self {
            Modality::Continuous => "Continuous",
            Modality::Auction => "Auction",
        }
    }
}

/// `--label-column` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LabelArg {
    /// Text first cell is the label, numeric rows are numbered 1..N
    Auto,
    /// First cell is always the label
    First,
    /// No label cell; rows are numbered 1..N
    None,
}

impl LabelArg {
    pub fn mode(self) -> LabelColumn {
        match self {
            LabelArg::Auto => LabelColumn::Auto,
            LabelArg::First => LabelColumn::First,
            LabelArg::None => LabelColumn::None,
        }
    }
}

/// Everything the page fetcher needs to know about the site and the browser.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub market_area: String,
    pub modality: Modality,
    pub product_minutes: u16,
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub row_selector: String,
    pub table_selector: String,
    pub max_fields: Option<usize>,
    pub label_column: LabelColumn,
    /// Upper bound for the session start, navigation, the table render and the
    /// page source read, each.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            market_area: "GB".to_string(),
            modality: Modality::Continuous,
            product_minutes: 30,
            webdriver_url: DEFAULT_WEBDRIVER.to_string(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            table_selector: DEFAULT_TABLE_SELECTOR.to_string(),
            max_fields: None,
            label_column: LabelColumn::Auto,
            timeout: Duration::from_millis(30_000),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl FetchConfig {
    /// Results page for `day`, table view.
    pub fn results_url(&self, day: MarketDay) -> String {
        let mut url = format!(
            "{}?market_area={}&delivery_date={}&modality={}",
            RESULTS_URL,
            self.market_area,
            day.query_value(),
            self.modality.as_query()
        );
        if self.modality == Modality::Auction {
            url.push_str("&sub_modality=DayAhead");
        }
        url.push_str(&format!("&data_mode=table&product={}", self.product_minutes));
        url
    }
}

/// Market areas are short codes such as `GB`, `FR`, `DE-LU`, `NO2`.
pub fn parse_market_area(s: &str) -> Result<String, ScrapeError> {
    let area = s.trim().to_ascii_uppercase();
    let valid = !area.is_empty()
        && area.len() <= 8
        && area.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(ScrapeError::InvalidArgument(format!("market area '{}'", s)));
    }
    Ok(area)
}

pub fn parse_product(s: &str) -> Result<u16, String> {
    let minutes: u16 = s.parse().map_err(|_| format!("'{}' is not a number of minutes", s))?;
    if PRODUCTS.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(format!("product must be one of {:?} minutes", PRODUCTS))
    }
}
