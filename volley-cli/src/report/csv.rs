use super::secs;
use std::io::{self, Write};
use volley::{AggregateReport, Reporter};

const HEADER: [&str; 10] = [
    "response-time",
    "DNS+dialup",
    "DNS",
    "TLS",
    "Request-write",
    "Response-delay",
    "Response-read",
    "status-code",
    "offset",
    "size",
];

/// Writes one row per completed request, in start order. Times are in seconds.
pub struct CsvReporter<W: Write> {
    out: W,
}

impl<W: Write> CsvReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Reporter for CsvReporter<W> {
    fn report(&mut self, report: &AggregateReport) -> io::Result<()> {
        let mut writer = ::csv::Writer::from_writer(&mut self.out);
        writer.write_record(HEADER)?;

        for result in &report.results {
            let Some(status) = result.status else {
                continue;
            };
            let phases = &result.phases;
            writer.write_record([
                secs(result.duration),
                secs(phases.dial()),
                secs(phases.dns),
                secs(phases.tls),
                secs(phases.write),
                secs(phases.wait),
                secs(phases.read),
                status.to_string(),
                secs(result.offset),
                result.size.to_string(),
            ])?;
        }

        writer.flush()
    }
}
