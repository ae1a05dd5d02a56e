use std::fmt;
use std::time::Duration;

/// Coarse classification of a failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Timeout,
    ConnectionRefused,
    Dns,
    Tls,
    /// HTTP protocol failure after a connection was established (malformed response, body
    /// cut short, ...).
    Http,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::Dns => "dns failure",
            ErrorKind::Tls => "tls failure",
            ErrorKind::Http => "http error",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("request timed out after {after:?}"),
        )
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Sub-durations of a single request.
///
/// `dns`, `connect` and `tls` are zero when the request ran on a pooled connection.
/// `connect` excludes DNS resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub dns: Duration,
    pub connect: Duration,
    pub tls: Duration,
    /// Connection ready until the request was fully written.
    pub write: Duration,
    /// Request written until the first response byte.
    pub wait: Duration,
    /// First response byte until the body was fully read.
    pub read: Duration,
}

impl PhaseTimings {
    /// DNS lookup plus TCP dial-up.
    pub fn dial(&self) -> Duration {
        self.dns + self.connect
    }
}

/// Outcome of one attempted request. Exactly one of `status` and `error` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestResult {
    /// Slot index claimed by the worker that issued the request.
    pub index: u64,
    /// Start time relative to the beginning of the run.
    pub offset: Duration,
    pub duration: Duration,
    pub phases: PhaseTimings,
    pub status: Option<u16>,
    /// Response body bytes read.
    pub size: u64,
    pub error: Option<RequestError>,
}

impl RequestResult {
    pub fn completed(
        index: u64,
        offset: Duration,
        duration: Duration,
        phases: PhaseTimings,
        status: u16,
        size: u64,
    ) -> Self {
        Self {
            index,
            offset,
            duration,
            phases,
            status: Some(status),
            size,
            error: None,
        }
    }

    pub fn failed(
        index: u64,
        offset: Duration,
        duration: Duration,
        phases: PhaseTimings,
        error: RequestError,
    ) -> Self {
        Self {
            index,
            offset,
            duration,
            phases,
            status: None,
            size: 0,
            error: Some(error),
        }
    }

    /// A response was received.
    pub fn is_completed(&self) -> bool {
        self.status.is_some()
    }

    /// End time relative to the beginning of the run.
    pub fn end(&self) -> Duration {
        self.offset + self.duration
    }
}
