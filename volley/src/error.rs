use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("This load test has already been run.")]
    AlreadyStarted,

    #[error("Failed to emit report: {0}")]
    Report(#[from] std::io::Error),
}
