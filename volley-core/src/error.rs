use thiserror::Error;

/// Problems with a run's configuration. Always reported before any request is issued.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Concurrency cannot be smaller than 1.")]
    ZeroConcurrency,

    #[error("Request count cannot be smaller than 1.")]
    NoRequests,

    #[error("Request count ({requests}) cannot be less than concurrency ({concurrency}).")]
    RequestsBelowConcurrency { requests: u64, concurrency: usize },

    #[error("Rate limit must be 0 or a finite number of requests per second between 0.001 and 1e9 (got {0}).")]
    InvalidRate(f64),

    #[error("Percentile {0} is outside of (0, 1].")]
    InvalidPercentile(f64),

    #[error("Unsupported URL scheme `{0}`; only http and https are supported.")]
    UnsupportedScheme(String),

    #[error("URL `{0}` has no host.")]
    MissingHost(String),

    #[error("Host override `{0}` is not a valid header value.")]
    InvalidHost(String),

    #[error("Invalid proxy `{0}`; expected an http:// URI with a host.")]
    InvalidProxy(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),
}
