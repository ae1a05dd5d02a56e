use std::time::Duration;

/// Request count used when neither a count nor a duration is provided.
pub const DEFAULT_REQUESTS: u64 = 200;

pub const DEFAULT_CONCURRENCY: usize = 50;

/// Per-request timeout used unless the transport overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum number of redirects followed for a single request.
pub const REDIRECT_LIMIT: usize = 10;

/// Number of equal-width buckets in the response-time histogram.
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Slowest pacing accepted for a rate limit, in requests per second.
pub const MIN_RATE: f64 = 0.001;

/// Fastest pacing accepted for a rate limit: one permit per nanosecond.
pub const MAX_RATE: f64 = 1e9;

pub const DEFAULT_PERCENTILES: [f64; 8] = [0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.99, 0.999];

pub const USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));
