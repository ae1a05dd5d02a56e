#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod aggregator;
mod error;
mod executor;
mod limiter;
mod pool;
mod report;
mod state;

pub use aggregator::{summarize, ResultSink};
pub use error::RunError;
pub use load_test::LoadTest;
pub use report::Reporter;
pub use state::{Lifecycle, Progress, StopHandle};

pub use volley_core::{
    AggregateReport, ConfigError, ErrorKind, HistogramBucket, HttpVersion, LatencySummary,
    LoadProfile, Percentile, PhaseStat, PhaseSummary, PhaseTimings, RequestError,
    RequestResult, RequestTemplate, TransportOptions, DEFAULT_CONCURRENCY, DEFAULT_REQUESTS,
    USER_AGENT,
};

pub mod prelude {
    pub use crate::{LoadTest, Reporter, RunError, StopHandle};
    pub use volley_core::{
        AggregateReport, ConfigError, LoadProfile, RequestTemplate, TransportOptions,
    };
}
