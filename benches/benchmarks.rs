//! Benchmarks for the report processing core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mini_report::context::{ItemCount, RunningSum};
use mini_report::layout::BandMeasure;
use mini_report::{
    ExpressionContext, GroupDef, NoopObserver, PageConstraints, PageLayouter, ProcessingConfig,
    ReportProcessor, ReportStructure, TableCursor, Value,
};

fn sales_table(rows: usize) -> TableCursor {
    let rows = (0..rows)
        .map(|i| {
            [
                Value::from(format!("region {}", i / 200)),
                Value::from(format!("city {}", i / 20)),
                Value::from(format!("Order {} with a description long enough to wrap", i)),
                Value::from((i % 97) as f64),
            ]
        })
        .collect();
    TableCursor::from_rows(["region", "city", "description", "amount"], rows)
}

fn run_report(rows: usize, config: &ProcessingConfig) -> usize {
    let structure = ReportStructure::new(vec![
        GroupDef::new("region", &[0]),
        GroupDef::new("city", &[1]),
    ]);
    let context = ExpressionContext::new(config.checkpoint_capacity)
        .with_function(ItemCount::new("count"))
        .with_function(RunningSum::new("total", 3).per_group(1));
    let layout = PageLayouter::new(config.page, config.rules);
    let mut report =
        ReportProcessor::new(sales_table(rows), structure, context, layout, config.clone())
            .expect("valid report");
    report.run(&mut NoopObserver).expect("report finishes").len()
}

fn bench_flat_traversal(c: &mut Criterion) {
    c.bench_function("flat_traversal_1000_rows", |b| {
        let config = ProcessingConfig::default();
        let structure = ReportStructure::flat();
        b.iter(|| {
            let layout = PageLayouter::new(config.page, config.rules);
            let mut report = ReportProcessor::new(
                sales_table(1000),
                structure.clone(),
                ExpressionContext::default(),
                layout,
                config.clone(),
            )
            .expect("valid report");
            black_box(report.run(&mut NoopObserver).expect("report finishes"));
        });
    });
}

fn bench_grouped_report(c: &mut Criterion) {
    c.bench_function("grouped_report_1000_rows", |b| {
        let config = ProcessingConfig::default();
        b.iter(|| black_box(run_report(1000, &config)));
    });
}

fn bench_rollback_heavy(c: &mut Criterion) {
    c.bench_function("rollback_heavy_report", |b| {
        // short pages leave group headers stranded often
        let config = ProcessingConfig {
            page: PageConstraints {
                page_height: 240.0,
                ..Default::default()
            },
            ..Default::default()
        };
        b.iter(|| black_box(run_report(400, &config)));
    });
}

fn bench_measure_rows(c: &mut Criterion) {
    c.bench_function("measure_row_height", |b| {
        let measure = BandMeasure::new(66, 14.0);
        let values = [
            Value::from("region 1"),
            Value::from("A fairly long description that needs several lines in its column"),
            Value::from(42.0),
        ];
        b.iter(|| black_box(measure.row_height(black_box(&values))));
    });
}

criterion_group!(
    benches,
    bench_flat_traversal,
    bench_grouped_report,
    bench_rollback_heavy,
    bench_measure_rows,
);

criterion_main!(benches);
