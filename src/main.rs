//! Mini-Report CLI (for testing purposes only)
//! The main interface is the library and its WASM bindings.

use mini_report::{ConfigError, ReportDefinition};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let Some(path) = std::env::args().nth(1) else {
        println!("Mini-Report Processing Core");
        println!("===========================");
        println!();
        println!("Usage: mini-report <report.json>");
        println!();
        println!("The report file holds `data`, `structure`, `functions` and `config`.");
        println!("Set RUST_LOG=mini_report=debug to trace page breaks and rollbacks.");
        return ExitCode::SUCCESS;
    };

    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str) -> Result<(), ConfigError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("cannot read {}: {}", path, e)))?;
    let mut report = ReportDefinition::from_json(&json)?.build()?;
    let stream = report.run(&mut mini_report::NoopObserver)?;

    println!(
        "{} steps, {} rows, {} rollbacks",
        stream.len(),
        stream.rows().len(),
        report.rollbacks()
    );
    for page in report.layout().pages() {
        match (page.start_row, page.end_row) {
            (Some(start), Some(end)) => println!(
                "page {:>3}: rows {}..={} ({} rows, {} bands)",
                page.page_number,
                start,
                end,
                page.row_count(),
                page.bands.len()
            ),
            _ => println!(
                "page {:>3}: no rows ({} bands)",
                page.page_number,
                page.bands.len()
            ),
        }
    }
    Ok(())
}
