use metrics_util::AtomicBucket;
use std::time::Duration;
use volley_core::{
    AggregateReport, ErrorKind, HistogramBucket, LatencySummary, Percentile, PhaseStat,
    PhaseSummary, PhaseTimings, RequestResult, HISTOGRAM_BUCKETS,
};

// Absorbs float noise in `q * n` so that e.g. 0.07 * 100 ranks as 7, not 8.
const RANK_EPSILON: f64 = 1e-9;

/// Lock-free collector for results submitted concurrently by workers.
pub struct ResultSink {
    results: AtomicBucket<RequestResult>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink {
    pub fn new() -> Self {
        Self {
            results: AtomicBucket::new(),
        }
    }

    pub fn submit(&self, result: RequestResult) {
        self.results.push(result);
    }

    /// Take every result submitted so far.
    pub fn drain(&self) -> Vec<RequestResult> {
        let mut results = vec![];
        self.results
            .clear_with(|block| results.extend_from_slice(block));
        results
    }

    /// Drain the sink and summarize it.
    pub fn finalize(&self, quantiles: &[f64]) -> AggregateReport {
        summarize(self.drain(), quantiles)
    }
}

/// Summarize a set of results. Independent of the order results arrive in.
///
/// Latency figures cover completed requests only; failures contribute to the counts and the
/// error tallies. Percentiles use nearest-rank selection over sorted latencies.
pub fn summarize(mut results: Vec<RequestResult>, quantiles: &[f64]) -> AggregateReport {
    results.sort_by_key(|r| (r.offset, r.index));

    let mut report = AggregateReport {
        attempted: results.len() as u64,
        ..AggregateReport::default()
    };

    let mut latencies = Vec::with_capacity(results.len());
    let mut phases = Vec::with_capacity(results.len());
    let mut first_start = None::<Duration>;
    let mut last_end = Duration::ZERO;

    for result in &results {
        first_start = Some(first_start.map_or(result.offset, |s| s.min(result.offset)));
        last_end = last_end.max(result.end());

        match (&result.error, result.status) {
            (None, Some(status)) => {
                report.completed += 1;
                report.total_bytes += result.size;
                *report.status_codes.entry(status).or_default() += 1;
                latencies.push(result.duration);
                phases.push(result.phases);
            }
            (error, _) => {
                report.failed += 1;
                let kind = error.as_ref().map_or(ErrorKind::Other, |e| e.kind);
                *report.error_kinds.entry(kind).or_default() += 1;
                if let Some(error) = error {
                    *report
                        .error_messages
                        .entry(error.message.clone())
                        .or_default() += 1;
                }
            }
        }
    }

    report.elapsed = first_start.map_or(Duration::ZERO, |start| last_end.saturating_sub(start));
    if !report.elapsed.is_zero() {
        report.throughput = report.completed as f64 / report.elapsed.as_secs_f64();
    }

    latencies.sort_unstable();
    report.latency = latency_summary(&latencies);
    report.percentiles = percentiles(&latencies, quantiles);
    report.histogram = histogram(&latencies);
    report.phases = phase_summary(&phases);
    report.results = results;

    report
}

fn latency_summary(sorted: &[Duration]) -> Option<LatencySummary> {
    let (fastest, slowest) = (*sorted.first()?, *sorted.last()?);
    let (mean, stddev) = mean_stddev(sorted);
    Some(LatencySummary {
        fastest,
        slowest,
        mean,
        stddev,
    })
}

fn mean_stddev(samples: &[Duration]) -> (Duration, Duration) {
    let secs: Vec<f64> = samples.iter().map(Duration::as_secs_f64).collect();
    if secs.is_empty() {
        return (Duration::ZERO, Duration::ZERO);
    }

    let mean = statistical::mean(&secs);
    let stddev = if secs.len() > 1 {
        statistical::standard_deviation(&secs, Some(mean))
    } else {
        0.
    };
    (secs_to_duration(mean), secs_to_duration(stddev))
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn rank_select(sorted: &[Duration], quantile: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (quantile * n as f64 - RANK_EPSILON).ceil() as usize;
    Some(sorted[rank.clamp(1, n) - 1])
}

fn percentiles(sorted: &[Duration], quantiles: &[f64]) -> Vec<Percentile> {
    quantiles
        .iter()
        .filter_map(|&quantile| {
            rank_select(sorted, quantile).map(|latency| Percentile { quantile, latency })
        })
        .collect()
}

/// Equal-width buckets spanning fastest to slowest; each bucket counts latencies up to and
/// including its upper bound.
fn histogram(sorted: &[Duration]) -> Vec<HistogramBucket> {
    let (Some(&fastest), Some(&slowest)) = (sorted.first(), sorted.last()) else {
        return vec![];
    };

    let width = (slowest - fastest) / HISTOGRAM_BUCKETS as u32;
    let mut buckets: Vec<HistogramBucket> = (1..=HISTOGRAM_BUCKETS)
        .map(|i| HistogramBucket {
            upper: if i == HISTOGRAM_BUCKETS {
                slowest
            } else {
                fastest + width * i as u32
            },
            count: 0,
        })
        .collect();

    let mut bucket = 0;
    for latency in sorted {
        while bucket < HISTOGRAM_BUCKETS - 1 && *latency > buckets[bucket].upper {
            bucket += 1;
        }
        buckets[bucket].count += 1;
    }

    buckets
}

fn phase_summary(phases: &[PhaseTimings]) -> Option<PhaseSummary> {
    if phases.is_empty() {
        return None;
    }

    let stat = |pick: fn(&PhaseTimings) -> Duration| {
        let samples: Vec<Duration> = phases.iter().map(pick).collect();
        let (mean, _) = mean_stddev(&samples);
        PhaseStat {
            mean,
            fastest: samples.iter().copied().min().unwrap_or_default(),
            slowest: samples.iter().copied().max().unwrap_or_default(),
        }
    };

    Some(PhaseSummary {
        dial: stat(PhaseTimings::dial),
        dns: stat(|p| p.dns),
        tls: stat(|p| p.tls),
        write: stat(|p| p.write),
        wait: stat(|p| p.wait),
        read: stat(|p| p.read),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use volley_core::{RequestError, DEFAULT_PERCENTILES};

    fn ok(index: u64, millis: u64) -> RequestResult {
        RequestResult::completed(
            index,
            Duration::from_millis(index * 10),
            Duration::from_millis(millis),
            PhaseTimings::default(),
            200,
            100,
        )
    }

    fn failed(index: u64, kind: ErrorKind) -> RequestResult {
        RequestResult::failed(
            index,
            Duration::from_millis(index * 10),
            Duration::from_millis(5),
            PhaseTimings::default(),
            RequestError::new(kind, kind.to_string()),
        )
    }

    #[test]
    fn nearest_rank_percentiles() {
        let results: Vec<_> = (1..=100).map(|i| ok(i, i)).collect();
        let report = summarize(results, &[0.07, 0.1, 0.5, 0.99, 0.999, 1.0]);

        let ms = |q| report.percentile(q).map(|d| d.as_millis());
        assert_eq!(ms(0.07), Some(7));
        assert_eq!(ms(0.1), Some(10));
        assert_eq!(ms(0.5), Some(50));
        assert_eq!(ms(0.99), Some(99));
        assert_eq!(ms(0.999), Some(100));
        assert_eq!(ms(1.0), Some(100));
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let mut results: Vec<_> = (0..500).map(|i| ok(i, 1 + (i * 37) % 211)).collect();
        results.extend((500..520).map(|i| failed(i, ErrorKind::Timeout)));
        let expected = summarize(results.clone(), &DEFAULT_PERCENTILES);

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..5 {
            results.shuffle(&mut rng);
            let report = summarize(results.clone(), &DEFAULT_PERCENTILES);
            assert_eq!(report.percentiles, expected.percentiles);
            assert_eq!(report.histogram, expected.histogram);
            assert_eq!(report.latency, expected.latency);
            assert_eq!(report.results, expected.results);
        }
    }

    #[test]
    fn tallies_sum_to_attempted() {
        let mut results: Vec<_> = (0..8).map(|i| ok(i, 10)).collect();
        results.push(failed(8, ErrorKind::ConnectionRefused));
        results.push(failed(9, ErrorKind::ConnectionRefused));
        results.push(failed(10, ErrorKind::Dns));

        let report = summarize(results, &[0.5]);
        assert_eq!(report.attempted, 11);
        assert_eq!(report.completed, 8);
        assert_eq!(report.failed, 3);

        let statuses: u64 = report.status_codes.values().sum();
        let errors: u64 = report.error_kinds.values().sum();
        assert_eq!(statuses + errors, report.attempted);
        assert_eq!(report.error_kinds[&ErrorKind::ConnectionRefused], 2);
        assert_eq!(report.total_bytes, 800);
    }

    #[test]
    fn histogram_covers_every_completed_request() {
        let results: Vec<_> = (0..97).map(|i| ok(i, 5 + i * 3)).collect();
        let report = summarize(results, &[]);

        assert_eq!(report.histogram.len(), HISTOGRAM_BUCKETS);
        let total: u64 = report.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 97);

        let last = report.histogram.last().unwrap();
        assert_eq!(last.upper, Duration::from_millis(5 + 96 * 3));
        assert!(report
            .histogram
            .windows(2)
            .all(|w| w[0].upper <= w[1].upper));
    }

    #[test]
    fn identical_latencies_fill_first_bucket() {
        let results: Vec<_> = (0..10).map(|i| ok(i, 20)).collect();
        let report = summarize(results, &[0.5]);
        assert_eq!(report.histogram[0].count, 10);

        let latency = report.latency.unwrap();
        assert_eq!(latency.fastest, latency.slowest);
        assert_eq!(latency.stddev, Duration::ZERO);
    }

    #[test]
    fn throughput_uses_wall_span() {
        // Starts at 0..=90ms, each lasting 10ms: the run spans 100ms.
        let results: Vec<_> = (0..10).map(|i| ok(i, 10)).collect();
        let report = summarize(results, &[]);

        assert_eq!(report.elapsed, Duration::from_millis(100));
        assert!((report.throughput - 100.).abs() < 1e-6);
    }

    #[test]
    fn failures_only_report() {
        let results = vec![failed(0, ErrorKind::Tls), failed(1, ErrorKind::Tls)];
        let report = summarize(results, &DEFAULT_PERCENTILES);

        assert_eq!(report.completed, 0);
        assert!(report.latency.is_none());
        assert!(report.percentiles.is_empty());
        assert!(report.histogram.is_empty());
        assert!(report.phases.is_none());
        assert_eq!(report.throughput, 0.);
        assert_eq!(report.error_messages["tls failure"], 2);
    }

    #[test]
    fn sink_drains_concurrent_submissions() {
        let sink = std::sync::Arc::new(ResultSink::new());
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        sink.submit(ok(t * 250 + i, 1));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let report = sink.finalize(&[0.5]);
        assert_eq!(report.attempted, 1_000);
        assert!(sink.drain().is_empty());
    }
}
