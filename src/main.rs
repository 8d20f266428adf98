use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use market_results::{
    workbook::parse_column, MarketDay, ScrapeError, TemplateLayout, TemplateWriter,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

mod config;
mod fetcher;
mod report;

use config::{FetchConfig, LabelArg, Modality};
use fetcher::PageFetcher;
use report::PrintFormat;

#[derive(Parser, Debug)]
#[command(name = "epex_scrape")]
#[command(about = "Scrape one day of EPEX Spot market results into an XLSX template")]
struct Args {
    /// Delivery day (YYYY-MM-DD)
    #[arg(long)]
    date: String,

    /// Template workbook; its header row defines the output columns
    #[arg(long)]
    template: PathBuf,

    /// Output workbook (must differ from the template)
    #[arg(long)]
    out: PathBuf,

    /// Page load and render timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// EPEX market area code
    #[arg(long, default_value = "GB")]
    market_area: String,

    /// Trading modality
    #[arg(long, value_enum, default_value = "continuous")]
    modality: Modality,

    /// Product length in minutes (15, 30 or 60)
    #[arg(long, default_value_t = 30, value_parser = config::parse_product)]
    product: u16,

    /// WebDriver endpoint (chromedriver)
    #[arg(long, default_value = config::DEFAULT_WEBDRIVER)]
    webdriver: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// CSS selector of the result rows
    #[arg(long, default_value = market_results::DEFAULT_ROW_SELECTOR)]
    row_selector: String,

    /// How the first cell of a row is used: auto treats a numeric first cell
    /// as a value and numbers the rows, first always takes it as the label
    #[arg(long, value_enum, default_value = "auto")]
    label_column: LabelArg,

    /// Keep only the first N value cells of every row (the label cell is not
    /// counted)
    #[arg(long)]
    columns: Option<usize>,

    /// Template sheet to fill (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// 1-based header row of the template
    #[arg(long, default_value_t = 1)]
    header_row: u32,

    /// First template column, as a letter or a 1-based number
    #[arg(long, default_value = "A")]
    first_column: String,

    /// Echo the extracted table to stdout
    #[arg(long, value_enum, default_value = "none")]
    print: PrintFormat,
}

fn parse_level(s: &str) -> std::result::Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level '{}'", s))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_target(false)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let day: MarketDay = args.date.parse()?;
    let layout = TemplateLayout::new(
        args.sheet.clone(),
        args.header_row,
        parse_column(&args.first_column)?,
    )?;
    let config = fetch_config(&args)?;

    preflight(&args.template, &args.out)?;

    info!("Fetching {} results for {}", config.market_area, day);
    let table = PageFetcher::new(config)
        .fetch(day)
        .await
        .context("fetching market results")?;

    report::print_table(&table, args.print)?;

    let summary = TemplateWriter::new(layout)
        .write(&table, &args.template, &args.out)
        .context("writing results workbook")?;

    info!(
        "Wrote {} rows to {} (sheet '{}')",
        summary.rows_written,
        args.out.display(),
        summary.sheet
    );
    Ok(())
}

fn fetch_config(args: &Args) -> std::result::Result<FetchConfig, ScrapeError> {
    if args.timeout_ms == 0 {
        return Err(ScrapeError::InvalidArgument("timeout must be positive".to_string()));
    }
    if args.columns == Some(0) {
        return Err(ScrapeError::InvalidArgument("--columns must be at least 1".to_string()));
    }

    Ok(FetchConfig {
        market_area: config::parse_market_area(&args.market_area)?,
        modality: args.modality,
        product_minutes: args.product,
        webdriver_url: args.webdriver.clone(),
        headless: !args.headed,
        row_selector: args.row_selector.clone(),
        max_fields: args.columns,
        label_column: args.label_column.mode(),
        timeout: Duration::from_millis(args.timeout_ms),
        ..FetchConfig::default()
    })
}

/// Reject unusable paths before a browser is started.
fn preflight(template: &Path, out: &Path) -> std::result::Result<(), ScrapeError> {
    if !template.is_file() {
        return Err(ScrapeError::Template {
            path: template.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    match out.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => Err(ScrapeError::Write {
            path: out.to_path_buf(),
            reason: format!("directory {} does not exist", dir.display()),
        }),
        _ => Ok(()),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ScrapeError>())
        .map(ScrapeError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(extra: &[&str]) -> std::result::Result<Args, clap::Error> {
        let mut argv = vec![
            "epex_scrape",
            "--date",
            "2025-11-05",
            "--template",
            "template.xlsx",
            "--out",
            "out.xlsx",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.timeout_ms, 30_000);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert_eq!(args.modality, Modality::Continuous);
        assert_eq!(args.product, 30);
        assert_eq!(args.print, PrintFormat::None);
        assert!(!args.headed);

        let config = fetch_config(&args).unwrap();
        assert_eq!(config.market_area, "GB");
        assert!(config.headless);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_fields, None);
        assert_eq!(config.label_column, market_results::LabelColumn::Auto);
    }

    #[test]
    fn test_required_arguments() {
        assert!(Args::try_parse_from(["epex_scrape", "--date", "2025-11-05"]).is_err());
        assert!(parse(&["--product", "45"]).is_err());
        assert!(parse(&["--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--market-area",
            "fr",
            "--modality",
            "auction",
            "--product",
            "60",
            "--headed",
            "--columns",
            "7",
            "--print",
            "summary",
            "--label-column",
            "first",
        ])
        .unwrap();
        let config = fetch_config(&args).unwrap();
        assert_eq!(config.market_area, "FR");
        assert_eq!(config.modality, Modality::Auction);
        assert_eq!(config.product_minutes, 60);
        assert!(!config.headless);
        assert_eq!(config.max_fields, Some(7));
        assert_eq!(config.label_column, market_results::LabelColumn::First);

        let args = parse(&["--columns", "0"]).unwrap();
        assert!(matches!(fetch_config(&args), Err(ScrapeError::InvalidArgument(_))));
    }

    #[test]
    fn test_preflight() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.xlsx");
        let out = dir.path().join("out.xlsx");

        let err = preflight(&template, &out).unwrap_err();
        assert_eq!(err.exit_code(), 5);

        std::fs::write(&template, b"placeholder").unwrap();
        assert!(preflight(&template, &out).is_ok());

        let err = preflight(&template, &dir.path().join("missing").join("out.xlsx")).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[tokio::test]
    async fn test_run_maps_errors_to_exit_codes() {
        let err = run(parse(&[]).unwrap()).await.unwrap_err();
        assert_eq!(exit_code(&err), 5); // template.xlsx does not exist

        let mut args = parse(&[]).unwrap();
        args.date = "2025-13-01".to_string();
        let err = run(args).await.unwrap_err();
        assert_eq!(exit_code(&err), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
