use anyhow::Result;
use clap::ValueEnum;
use market_results::ResultTable;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrintFormat {
    None,
    Json,
    Csv,
    Summary,
}

/// Echo the extracted table to stdout before it goes into the workbook.
pub fn print_table(table: &ResultTable, format: PrintFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        PrintFormat::None => {}
        PrintFormat::Json => {
            serde_json::to_writer_pretty(&mut out, table)?;
            writeln!(out)?;
        }
        PrintFormat::Csv => write_csv(table, &mut out)?,
        PrintFormat::Summary => write_summary(table, &mut out)?,
    }
    Ok(())
}

fn write_csv<W: Write>(table: &ResultTable, out: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    let mut header = vec!["slot".to_string()];
    header.extend((1..table.max_width()).map(|i| format!("value_{}", i)));
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.slot.to_string()];
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Per-column min/max/mean over the present values.
pub fn column_stats(table: &ResultTable) -> Vec<Option<(f64, f64, f64)>> {
    let width = table.max_width().saturating_sub(1);
    (0..width)
        .map(|col| {
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|r| r.values.get(col).copied().flatten())
                .collect();
            if values.is_empty() {
                return None;
            }
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some((min, max, mean))
        })
        .collect()
}

fn write_summary<W: Write>(table: &ResultTable, mut out: W) -> Result<()> {
    writeln!(out, "Market Results Summary")?;
    writeln!(out, "======================")?;
    writeln!(out, "Delivery day: {}", table.day)?;
    writeln!(out, "Rows: {}", table.len())?;
    if let (Some(first), Some(last)) = (table.rows.first(), table.rows.last()) {
        writeln!(out, "Slots: {} .. {}", first.slot, last.slot)?;
    }
    writeln!(out)?;

    for (i, stats) in column_stats(table).iter().enumerate() {
        match stats {
            Some((min, max, mean)) => writeln!(
                out,
                "  value_{}: min {:.2}, max {:.2}, mean {:.2}",
                i + 1,
                min,
                max,
                mean
            )?,
            None => writeln!(out, "  value_{}: no values", i + 1)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_results::{ResultRow, SlotLabel};

    fn table() -> ResultTable {
        ResultTable::new(
            "2025-11-05".parse().unwrap(),
            vec![
                ResultRow::new(SlotLabel::Text("00:00-01:00".into()), vec![Some(42.5), Some(1200.0)]),
                ResultRow::new(SlotLabel::Text("01:00-02:00".into()), vec![Some(39.1), None]),
            ],
        )
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_csv(&table(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "slot,value_1,value_2\n00:00-01:00,42.5,1200\n01:00-02:00,39.1,\n"
        );
    }

    #[test]
    fn test_column_stats_skip_missing_values() {
        let stats = column_stats(&table());
        assert_eq!(stats.len(), 2);
        let (min, max, mean) = stats[0].unwrap();
        assert_eq!(min, 39.1);
        assert_eq!(max, 42.5);
        assert!((mean - 40.8).abs() < 1e-9);
        assert_eq!(stats[1], Some((1200.0, 1200.0, 1200.0)));
    }

    #[test]
    fn test_summary_mentions_day_and_rows() {
        let mut buf = Vec::new();
        write_summary(&table(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Delivery day: 2025-11-05"));
        assert!(text.contains("Rows: 2"));
        assert!(text.contains("Slots: 00:00-01:00 .. 01:00-02:00"));
    }
}
