use market_results::{
    workbook::read_data_region, MarketDay, ResultRow, ResultTable, SlotLabel, TemplateLayout,
    TemplateWriter,
};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Build a small template: header row with three columns
    let mut book = umya_spreadsheet::new_file();
    if let Some(sheet) = book.get_sheet_mut(&0) {
        sheet.get_cell_mut("A1").set_value_string("Hour");
        sheet.get_cell_mut("B1").set_value_string("Price");
        sheet.get_cell_mut("C1").set_value_string("Volume");
    }
    let template = Path::new("template_sample.xlsx");
    umya_spreadsheet::writer::xlsx::write(&book, template)?;

    // Two hourly results as they appear on the page
    let day: MarketDay = "2025-11-05".parse()?;
    let table = ResultTable::new(
        day,
        vec![
            ResultRow::new(SlotLabel::Text("00:00-01:00".into()), vec![Some(42.5), Some(1200.0)]),
            ResultRow::new(SlotLabel::Text("01:00-02:00".into()), vec![Some(39.1), Some(1100.0)]),
        ],
    );

    let out = Path::new("results_sample.xlsx");
    let writer = TemplateWriter::new(TemplateLayout::default());
    let summary = writer.write(&table, template, out)?;

    println!(
        "Wrote {} rows into sheet '{}' of {}",
        summary.rows_written,
        summary.sheet,
        out.display()
    );
    for row in read_data_region(out, writer.layout(), table.len())? {
        println!("  {}", row.join(" | "));
    }

    Ok(())
}
