use super::secs;
use std::io::{self, Write};
use volley::{AggregateReport, PhaseStat};

const BAR: char = '■';
const BAR_WIDTH: u64 = 40;

/// Human readable run summary.
pub struct SummaryReporter<W: Write> {
    out: W,
}

impl<W: Write> SummaryReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> volley::Reporter for SummaryReporter<W> {
    fn report(&mut self, report: &AggregateReport) -> io::Result<()> {
        let out = &mut self.out;

        writeln!(out, "\nSummary:")?;
        writeln!(out, "  Total:\t{} secs", secs(report.elapsed))?;
        if let Some(latency) = &report.latency {
            writeln!(out, "  Slowest:\t{} secs", secs(latency.slowest))?;
            writeln!(out, "  Fastest:\t{} secs", secs(latency.fastest))?;
            writeln!(out, "  Average:\t{} secs", secs(latency.mean))?;
            writeln!(out, "  Std dev:\t{} secs", secs(latency.stddev))?;
        }
        writeln!(out, "  Requests/sec:\t{:.4}", report.throughput)?;

        if report.total_bytes > 0 {
            writeln!(out)?;
            writeln!(out, "  Total data:\t{} bytes", report.total_bytes)?;
            writeln!(
                out,
                "  Size/request:\t{} bytes",
                report.bytes_per_request().round() as u64
            )?;
        }

        if !report.histogram.is_empty() {
            writeln!(out, "\nResponse time histogram:")?;
            let max = report.histogram.iter().map(|b| b.count).max().unwrap_or(0);
            for bucket in &report.histogram {
                let bar = if max > 0 {
                    (bucket.count * BAR_WIDTH + max / 2) / max
                } else {
                    0
                };
                writeln!(
                    out,
                    "  {:.3} [{}]\t|{}",
                    bucket.upper.as_secs_f64(),
                    bucket.count,
                    BAR.to_string().repeat(bar as usize)
                )?;
            }
        }

        if !report.percentiles.is_empty() {
            writeln!(out, "\nLatency distribution:")?;
            for p in &report.percentiles {
                writeln!(
                    out,
                    "  {}% in {} secs",
                    percent(p.quantile),
                    secs(p.latency)
                )?;
            }
        }

        if let Some(phases) = &report.phases {
            writeln!(out, "\nDetails (average, fastest, slowest):")?;
            let rows = [
                ("DNS+dialup", &phases.dial),
                ("DNS-lookup", &phases.dns),
                ("TLS", &phases.tls),
                ("req write", &phases.write),
                ("resp wait", &phases.wait),
                ("resp read", &phases.read),
            ];
            for (label, stat) in rows {
                writeln!(out, "  {label}:\t{}", phase(stat))?;
            }
        }

        if !report.status_codes.is_empty() {
            writeln!(out, "\nStatus code distribution:")?;
            for (status, count) in &report.status_codes {
                writeln!(out, "  [{status}]\t{count} responses")?;
            }
        }

        if !report.error_messages.is_empty() {
            writeln!(out, "\nError distribution:")?;
            for (message, count) in &report.error_messages {
                writeln!(out, "  [{count}]\t{message}")?;
            }

            writeln!(out, "\nError kinds:")?;
            for (kind, count) in &report.error_kinds {
                writeln!(out, "  [{count}]\t{kind}")?;
            }
        }

        writeln!(out)?;
        out.flush()
    }
}

fn phase(stat: &PhaseStat) -> String {
    format!(
        "{} secs, {} secs, {} secs",
        secs(stat.mean),
        secs(stat.fastest),
        secs(stat.slowest)
    )
}

/// `0.999` renders as `99.9`, `0.5` as `50`.
fn percent(quantile: f64) -> String {
    let rendered = format!("{:.3}", quantile * 100.);
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
