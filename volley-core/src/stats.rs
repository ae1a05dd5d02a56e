use crate::{ErrorKind, RequestResult};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencySummary {
    pub fastest: Duration,
    pub slowest: Duration,
    pub mean: Duration,
    pub stddev: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Percentile {
    /// In (0, 1].
    pub quantile: f64,
    pub latency: Duration,
}

/// Histogram bucket holding latencies at or below `upper` (and above the previous bucket).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistogramBucket {
    pub upper: Duration,
    pub count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseStat {
    pub mean: Duration,
    pub fastest: Duration,
    pub slowest: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// DNS lookup plus dial-up.
    pub dial: PhaseStat,
    pub dns: PhaseStat,
    pub tls: PhaseStat,
    pub write: PhaseStat,
    pub wait: PhaseStat,
    pub read: PhaseStat,
}

/// Statistical summary of a finished (or stopped) run.
///
/// Latency statistics, percentiles, the histogram and phase statistics only cover completed
/// requests. Every attempted request appears exactly once in either `status_codes` or
/// `error_kinds`.
#[derive(Clone, Debug, Default)]
pub struct AggregateReport {
    pub attempted: u64,
    pub completed: u64,
    pub failed: u64,
    /// First dispatch until last completion.
    pub elapsed: Duration,
    /// Completed requests per second over `elapsed`.
    pub throughput: f64,
    pub total_bytes: u64,
    pub latency: Option<LatencySummary>,
    pub percentiles: Vec<Percentile>,
    pub histogram: Vec<HistogramBucket>,
    pub phases: Option<PhaseSummary>,
    pub status_codes: BTreeMap<u16, u64>,
    pub error_kinds: BTreeMap<ErrorKind, u64>,
    pub error_messages: BTreeMap<String, u64>,
    /// Every result, ordered by start offset.
    pub results: Vec<RequestResult>,
}

impl AggregateReport {
    pub fn error_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.
        } else {
            self.failed as f64 / self.attempted as f64
        }
    }

    /// Average response size of completed requests.
    pub fn bytes_per_request(&self) -> f64 {
        if self.completed == 0 {
            0.
        } else {
            self.total_bytes as f64 / self.completed as f64
        }
    }

    pub fn percentile(&self, quantile: f64) -> Option<Duration> {
        self.percentiles
            .iter()
            .find(|p| (p.quantile - quantile).abs() < f64::EPSILON)
            .map(|p| p.latency)
    }
}
