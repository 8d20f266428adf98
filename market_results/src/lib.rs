pub mod error;
pub mod extract;
pub mod models;
pub mod workbook;

pub use error::ScrapeError;
pub use extract::{LabelColumn, TableExtractor, DEFAULT_ROW_SELECTOR};
pub use models::{MarketDay, ResultRow, ResultTable, SlotLabel};
pub use workbook::{TemplateLayout, TemplateWriter, WriteSummary};
