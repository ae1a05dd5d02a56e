use clap::ValueEnum;
use std::io::Write;
use volley::Reporter;

mod csv;
mod summary;

pub use self::csv::CsvReporter;
pub use summary::SummaryReporter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable summary.
    Summary,
    /// One row per completed request.
    Csv,
}

pub fn reporter<W: Write + 'static>(format: OutputFormat, out: W) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Summary => Box::new(SummaryReporter::new(out)),
        OutputFormat::Csv => Box::new(CsvReporter::new(out)),
    }
}

fn secs(duration: std::time::Duration) -> String {
    format!("{:.4}", duration.as_secs_f64())
}
