use criterion::{black_box, criterion_group, criterion_main, Criterion};
use market_results::{MarketDay, TableExtractor, DEFAULT_ROW_SELECTOR};

/// A rendered half-hourly page: 48 data rows, each hour preceded by a `-` row.
fn sample_page() -> String {
    let mut body = String::new();
    for hh in 0..48 {
        if hh % 2 == 0 {
            body.push_str("<tr><td>-</td><td>-</td><td>-</td><td>-</td><td>-</td><td>-</td><td>-</td></tr>");
        }
        let base = 60.0 + hh as f64;
        body.push_str(&format!(
            "<tr><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>1,{:03}.5</td><td>{}.0</td><td>{}.0</td></tr>",
            base - 5.0,
            base + 5.0,
            base,
            base + 0.25,
            hh * 7,
            300 + hh,
            280 + hh
        ));
    }

    format!(
        r#"<html><body><table class="table-01"><tbody>{}</tbody></table></body></html>"#,
        body
    )
}

fn benchmark_extract_half_hourly(c: &mut Criterion) {
    let html = sample_page();
    let day: MarketDay = "2025-11-05".parse().unwrap();
    let extractor = TableExtractor::new(DEFAULT_ROW_SELECTOR).unwrap();

    c.bench_function("extract_48_rows", |b| {
        b.iter(|| {
            let table = extractor.extract(black_box(&html), day);
            black_box(table)
        });
    });
}

criterion_group!(benches, benchmark_extract_half_hourly);
criterion_main!(benches);
