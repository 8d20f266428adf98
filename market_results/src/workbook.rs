use log::{debug, info};
use std::path::Path;
use tempfile::NamedTempFile;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{Result, ScrapeError};
use crate::models::{ResultRow, ResultTable, SlotLabel};

/// Excel's last column (XFD).
const MAX_COLUMN: u32 = 16_384;

/// Where the data region of a template lives.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLayout {
    /// Sheet to fill; `None` means the first worksheet.
    pub sheet: Option<String>,
    /// 1-based row holding the header labels.
    pub header_row: u32,
    /// 1-based column of the first header label.
    pub first_column: u32,
    /// 1-based row the first result row goes to.
    pub first_data_row: u32,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: 1,
            first_column: 1,
            first_data_row: 2,
        }
    }
}

impl TemplateLayout {
    /// Data starts on the row directly under the header.
    pub fn new(sheet: Option<String>, header_row: u32, first_column: u32) -> Result<Self> {
        if header_row == 0 || header_row >= 1_048_576 {
            return Err(ScrapeError::InvalidArgument(format!(
                "header row {} out of range",
                header_row
            )));
        }
        if first_column == 0 || first_column > MAX_COLUMN {
            return Err(ScrapeError::InvalidArgument(format!(
                "first column {} out of range",
                first_column
            )));
        }

        Ok(Self {
            sheet,
            header_row,
            first_column,
            first_data_row: header_row + 1,
        })
    }
}

/// Parse a column given as letters (`A`, `AB`) or as a 1-based number.
pub fn parse_column(s: &str) -> Result<u32> {
    let s = s.trim();
    let invalid = || ScrapeError::InvalidArgument(format!("column '{}' is not a letter or number", s));

    if s.is_empty() {
        return Err(invalid());
    }

    let col = if s.chars().all(|c| c.is_ascii_digit()) {
        s.parse::<u32>().map_err(|_| invalid())?
    } else if s.chars().all(|c| c.is_ascii_alphabetic()) && s.len() <= 3 {
        s.to_ascii_uppercase()
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1))
    } else {
        return Err(invalid());
    };

    if col == 0 || col > MAX_COLUMN {
        return Err(invalid());
    }
    Ok(col)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    pub sheet: String,
    pub columns: usize,
    pub rows_written: usize,
}

/// Fills the data region of a template workbook and saves it under a new name.
pub struct TemplateWriter {
    layout: TemplateLayout,
}

impl TemplateWriter {
    pub fn new(layout: TemplateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &TemplateLayout {
        &self.layout
    }

    /// Write `table` into a copy of `template` saved at `out`.
    ///
    /// Nothing is written to disk unless every row fits the template header.
    /// The save goes through a temporary file in the output directory, so
    /// `out` is either untouched or complete.
    pub fn write(&self, table: &ResultTable, template: &Path, out: &Path) -> Result<WriteSummary> {
        ensure_distinct(template, out)?;

        let mut book = load_template(template)?;
        let sheet = select_sheet_mut(&mut book, &self.layout, template)?;
        let sheet_name = sheet.get_name().to_string();

        let columns = header_columns(sheet, &self.layout);
        if columns == 0 {
            return Err(ScrapeError::template(
                template,
                format!("header row {} of sheet '{}' is empty", self.layout.header_row, sheet_name),
            ));
        }
        info!(
            "Template {} sheet '{}': {} header columns",
            template.display(),
            sheet_name,
            columns
        );

        check_schema(table, columns)?;

        for (offset, row) in table.rows.iter().enumerate() {
            let r = self.layout.first_data_row + offset as u32;
            write_row(sheet, r, self.layout.first_column, row);
        }
        debug!("Filled {} rows starting at row {}", table.len(), self.layout.first_data_row);

        save_atomic(&book, out)?;

        Ok(WriteSummary {
            sheet: sheet_name,
            columns,
            rows_written: table.len(),
        })
    }
}

/// Read `rows` data rows back as display strings, one entry per header column.
pub fn read_data_region(path: &Path, layout: &TemplateLayout, rows: usize) -> Result<Vec<Vec<String>>> {
    let mut book = load_template(path)?;
    let sheet = select_sheet_mut(&mut book, layout, path)?;
    let columns = header_columns(sheet, layout) as u32;

    Ok((0..rows as u32)
        .map(|offset| {
            let r = layout.first_data_row + offset;
            (0..columns)
                .map(|c| sheet.get_value((layout.first_column + c, r)))
                .collect()
        })
        .collect())
}

fn ensure_distinct(template: &Path, out: &Path) -> Result<()> {
    let same = template == out
        || match (template.canonicalize(), out.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };

    if same {
        return Err(ScrapeError::InvalidArgument(format!(
            "output {} would overwrite the template",
            out.display()
        )));
    }
    Ok(())
}

fn load_template(path: &Path) -> Result<Spreadsheet> {
    if !path.is_file() {
        return Err(ScrapeError::template(path, "file not found"));
    }
    umya_spreadsheet::reader::xlsx::read(path).map_err(|e| ScrapeError::template(path, e))
}

fn select_sheet_mut<'a>(
    book: &'a mut Spreadsheet,
    layout: &TemplateLayout,
    path: &Path,
) -> Result<&'a mut Worksheet> {
    match &layout.sheet {
        Some(name) => book
            .get_sheet_by_name_mut(name)
            .ok_or_else(|| ScrapeError::template(path, format!("no sheet named '{}'", name))),
        None => book
            .get_sheet_mut(&0)
            .ok_or_else(|| ScrapeError::template(path, "workbook has no worksheets")),
    }
}

/// Contiguous non-empty header cells starting at the layout's first column.
fn header_columns(sheet: &Worksheet, layout: &TemplateLayout) -> usize {
    (layout.first_column..=MAX_COLUMN)
        .take_while(|&c| !sheet.get_value((c, layout.header_row)).trim().is_empty())
        .count()
}

fn check_schema(table: &ResultTable, columns: usize) -> Result<()> {
    match table.rows.iter().position(|r| r.width() > columns) {
        Some(i) => Err(ScrapeError::SchemaMismatch {
            row: i + 1,
            width: table.rows[i].width(),
            columns,
        }),
        None => Ok(()),
    }
}

fn write_row(sheet: &mut Worksheet, r: u32, first_column: u32, row: &ResultRow) {
    let label = sheet.get_cell_mut((first_column, r));
    match &row.slot {
        SlotLabel::Index(n) => label.set_value_number(*n),
        SlotLabel::Text(s) => label.set_value_string(s.clone()),
    };

    for (i, value) in row.values.iter().enumerate() {
        let cell = sheet.get_cell_mut((first_column + 1 + i as u32, r));
        match value {
            Some(v) => cell.set_value_number(*v),
            None => cell.set_value_string(""),
        };
    }
}

fn save_atomic(book: &Spreadsheet, out: &Path) -> Result<()> {
    let dir = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if out.is_dir() {
        return Err(ScrapeError::write(out, "path is a directory"));
    }
    // persist() renames over the target, which succeeds on a read-only file
    if let Ok(meta) = out.metadata() {
        if meta.permissions().readonly() {
            return Err(ScrapeError::write(out, "file is read-only"));
        }
    }

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ScrapeError::write(out, e))?;
    umya_spreadsheet::writer::xlsx::write_writer(book, &mut tmp)
        .map_err(|e| ScrapeError::write(out, e))?;
    tmp.persist(out).map_err(|e| ScrapeError::write(out, e.error))?;

    info!("Saved {}", out.display());
    Ok(())
}
