use std::io;
use volley_core::AggregateReport;

/// Renders a finished run.
///
/// The engine decides what a report contains; implementors only decide how it looks.
pub trait Reporter {
    fn report(&mut self, report: &AggregateReport) -> io::Result<()>;
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, report: &AggregateReport) -> io::Result<()> {
        (**self).report(report)
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, report: &AggregateReport) -> io::Result<()> {
        (**self).report(report)
    }
}
