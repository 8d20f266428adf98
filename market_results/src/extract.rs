use log::debug;
use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};
use crate::models::{MarketDay, ResultRow, ResultTable, SlotLabel};

/// Rows of the EPEX market-results table once the page has rendered.
pub const DEFAULT_ROW_SELECTOR: &str = "table.table-01 tbody tr";

/// How the first cell of a row is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelColumn {
    /// Text first cells are labels; numeric first cells are fields and rows
    /// are numbered from 1.
    #[default]
    Auto,
    /// The first cell is always the label. Integer labels stay numbers.
    First,
    /// Every cell is a field and rows are numbered from 1.
    None,
}

/// Turns rendered page source into a `ResultTable`.
pub struct TableExtractor {
    row_selector: Selector,
    max_fields: Option<usize>,
    label_column: LabelColumn,
}

impl TableExtractor {
    pub fn new(row_selector: &str) -> Result<Self> {
        let row_selector = Selector::parse(row_selector).map_err(|e| {
            ScrapeError::InvalidArgument(format!("row selector '{}': {:?}", row_selector, e))
        })?;

        Ok(Self {
            row_selector,
            max_fields: None,
            label_column: LabelColumn::Auto,
        })
    }

    /// Keep only the first `n` field cells of every row.
    pub fn with_max_fields(mut self, n: Option<usize>) -> Self {
        self.max_fields = n;
        self
    }

    pub fn with_label_column(mut self, mode: LabelColumn) -> Self {
        self.label_column = mode;
        self
    }

    /// Extract every visible data row in display order.
    ///
    /// Rows without cells and rows made only of `-` placeholders (the hour
    /// separators on the page) are skipped. The first cell becomes the label
    /// according to the `LabelColumn` mode.
    pub fn extract(&self, html: &str, day: MarketDay) -> ResultTable {
        let document = Html::parse_document(html);
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for tr in document.select(&self.row_selector) {
            if is_hidden(&tr) {
                skipped += 1;
                continue;
            }

            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| c.value().name() == "td")
                .map(|td| normalize_ws(&td.text().collect::<String>()))
                .collect();

            if cells.iter().all(|c| c.is_empty() || c == "-") {
                skipped += 1;
                continue;
            }

            let numbered = SlotLabel::Index(rows.len() as u32 + 1);
            let (slot, fields) = match self.label_column {
                LabelColumn::None => (numbered, &cells[..]),
                LabelColumn::Auto if is_numeric_like(&cells[0]) => (numbered, &cells[..]),
                LabelColumn::Auto => (SlotLabel::Text(cells[0].clone()), &cells[1..]),
                LabelColumn::First => (first_cell_label(&cells[0]), &cells[1..]),
            };

            let keep = self.max_fields.unwrap_or(fields.len()).min(fields.len());
            let values = fields[..keep].iter().map(|c| parse_number(c)).collect();

            rows.push(ResultRow::new(slot, values));
        }

        debug!("Extracted {} rows, skipped {} for {}", rows.len(), skipped, day);
        ResultTable::new(day, rows)
    }
}

fn first_cell_label(cell: &str) -> SlotLabel {
    match clean_number(cell).parse::<u32>() {
        Ok(n) => SlotLabel::Index(n),
        Err(_) => SlotLabel::Text(cell.to_string()),
    }
}

fn is_hidden(el: &ElementRef) -> bool {
    let v = el.value();
    if v.attr("hidden").is_some() {
        return true;
    }
    v.attr("style")
        .map(|s| {
            let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            compact.to_ascii_lowercase().contains("display:none")
        })
        .unwrap_or(false)
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_number(s: &str) -> String {
    s.trim().replace(',', "").replace('\u{2212}', "-")
}

/// `-` and empty cells count as numeric: they are missing values, not labels.
fn is_numeric_like(s: &str) -> bool {
    let s = clean_number(s);
    s.is_empty() || s == "-" || s.parse::<f64>().is_ok()
}

/// Cell text to a number; `-`, empty and unparsable text are `None`.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = clean_number(s);
    if s.is_empty() || s == "-" {
        return None;
    }
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> MarketDay {
        "2025-11-05".parse().unwrap()
    }

    fn page(body: &str) -> String {
        format!(
            r#"<html><body><div class="js-table-values">
            <table class="table-01"><thead><tr><th>Low</th><th>High</th></tr></thead>
            <tbody>{}</tbody></table></div></body></html>"#,
            body
        )
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42.5"), Some(42.5));
        assert_eq!(parse_number(" 1,200.00 "), Some(1200.0));
        assert_eq!(parse_number("-3.1"), Some(-3.1));
        assert_eq!(parse_number("\u{2212}3.1"), Some(-3.1));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_numbered_rows_skip_hour_separators() {
        let html = page(
            "<tr><td>-</td><td>-</td><td>-</td></tr>
             <tr><td>80.10</td><td>95.00</td><td>1,234.5</td></tr>
             <tr><td>-</td><td>-</td><td>-</td></tr>
             <tr><td>78.00</td><td>-</td><td>900</td></tr>",
        );
        let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        let table = extractor.extract(&html, day());

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].slot, SlotLabel::Index(1));
        assert_eq!(table.rows[0].values, vec![Some(80.1), Some(95.0), Some(1234.5)]);
        assert_eq!(table.rows[1].slot, SlotLabel::Index(2));
        assert_eq!(table.rows[1].values, vec![Some(78.0), None, Some(900.0)]);
    }

    #[test]
    fn test_labelled_rows_keep_display_order() {
        let html = page(
            "<tr><td>01:00-02:00</td><td>39.1</td><td>1100</td></tr>
             <tr><td>00:00-01:00</td><td>42.5</td><td>1200</td></tr>",
        );
        let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        let table = extractor.extract(&html, day());

        let labels: Vec<String> = table.rows.iter().map(|r| r.slot.to_string()).collect();
        assert_eq!(labels, vec!["01:00-02:00", "00:00-01:00"]);
        assert_eq!(table.rows[1].values, vec![Some(42.5), Some(1200.0)]);
    }

    #[test]
    fn test_hidden_rows_and_nested_text() {
        let html = page(
            r#"<tr style="display: none"><td>1</td></tr>
               <tr hidden><td>2</td></tr>
               <tr><td><span>  10 </span></td><td><b>11</b></td></tr>"#,
        );
        let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        let table = extractor.extract(&html, day());

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].values, vec![Some(10.0), Some(11.0)]);
    }

    #[test]
    fn test_max_fields_truncates_only_when_asked() {
        let html = page("<tr><td>1</td><td>2</td><td>3</td><td>4</td></tr>");

        let all = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        assert_eq!(all.extract(&html, day()).rows[0].values.len(), 4);

        let capped = TableExtractor::new(DEFAULT_ROW_SELECTOR)
            .unwrap()
            .with_max_fields(Some(3));
        assert_eq!(capped.extract(&html, day()).rows[0].values.len(), 3);
    }

    #[test]
    fn test_empty_body_and_missing_table() {
        let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        assert!(extractor.extract(&page(""), day()).is_empty());
        assert!(extractor.extract("<html><body><p>No data</p></body></html>", day()).is_empty());
    }

    #[test]
    fn test_label_column_modes_for_numeric_first_cell() {
        let html = page(
            "<tr><td>1</td><td>42.5</td><td>1200</td></tr>
             <tr><td>2</td><td>39.1</td><td>1100</td></tr>",
        );

        let auto = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();
        let table = auto.extract(&html, day());
        assert_eq!(table.rows[1].slot, SlotLabel::Index(2));
        assert_eq!(table.rows[1].values, vec![Some(2.0), Some(39.1), Some(1100.0)]);

        let first = TableExtractor::new(DEFAULT_ROW_SELECTOR)
            .unwrap()
            .with_label_column(LabelColumn::First);
        let table = first.extract(&html, day());
        assert_eq!(table.rows[0].slot, SlotLabel::Index(1));
        assert_eq!(table.rows[0].values, vec![Some(42.5), Some(1200.0)]);
        assert_eq!(table.rows[0].width(), 3);
        assert_eq!(table.rows[1].slot, SlotLabel::Index(2));
    }

    #[test]
    fn test_label_column_none_keeps_text_cells_as_fields() {
        let html = page("<tr><td>00:00-01:00</td><td>42.5</td></tr>");
        let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR)
            .unwrap()
            .with_label_column(LabelColumn::None);
        let table = extractor.extract(&html, day());

        assert_eq!(table.rows[0].slot, SlotLabel::Index(1));
        assert_eq!(table.rows[0].values, vec![None, Some(42.5)]);
    }

    #[test]
    fn test_bad_selector() {
        assert!(matches!(
            TableExtractor::new("tr["),
            Err(ScrapeError::InvalidArgument(_))
        ));
    }
}
