use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use volley_core::PhaseTimings;

tokio::task_local! {
    pub(crate) static REQUEST_TRACE: Arc<RequestTrace>;
}

/// Connection lifecycle timestamps recorded on behalf of one request.
///
/// The executor scopes a fresh trace around every request; the resolver and connectors pick it
/// up with [`RequestTrace::current`]. A new connection attempt resets the marks, so after a
/// redirect only the last connection is described.
#[derive(Debug, Default)]
pub(crate) struct RequestTrace {
    marks: Mutex<Marks>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Marks {
    connect_start: Option<Instant>,
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    connected: Option<Instant>,
    secured: Option<Instant>,
    conn_id: Option<u64>,
}

/// Establishment timings of a connection opened for the traced request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Handshake {
    pub dns: Duration,
    pub connect: Duration,
    pub tls: Duration,
    /// When the connection became usable for writing the request.
    pub ready: Instant,
}

impl RequestTrace {
    pub fn current() -> Option<Arc<Self>> {
        REQUEST_TRACE.try_with(Arc::clone).ok()
    }

    pub fn connect_start(&self) {
        *self.marks() = Marks {
            connect_start: Some(Instant::now()),
            ..Marks::default()
        };
    }

    pub fn dns_start(&self) {
        self.marks().dns_start = Some(Instant::now());
    }

    pub fn dns_done(&self) {
        self.marks().dns_done = Some(Instant::now());
    }

    pub fn connected(&self, conn_id: u64) {
        let mut marks = self.marks();
        marks.connected = Some(Instant::now());
        marks.conn_id = Some(conn_id);
    }

    pub fn secured(&self) {
        self.marks().secured = Some(Instant::now());
    }

    /// Timings for connection `conn_id`, or `None` if the request ran on a connection it did
    /// not open (a pooled one, or one that lost the race against the pool).
    pub fn handshake(&self, conn_id: u64) -> Option<Handshake> {
        let marks = *self.marks();
        if marks.conn_id != Some(conn_id) {
            return None;
        }

        let connect_start = marks.connect_start?;
        let connected = marks.connected?;
        let dns = marks.dns();
        let ready = marks.secured.unwrap_or(connected);

        Some(Handshake {
            dns,
            connect: connected
                .saturating_duration_since(connect_start)
                .saturating_sub(dns),
            tls: ready.saturating_duration_since(connected),
            ready,
        })
    }

    /// Phases that finished before a request failed.
    pub fn partial(&self) -> PhaseTimings {
        let marks = *self.marks();
        let dns = marks.dns();
        let connect = match (marks.connect_start, marks.connected) {
            (Some(start), Some(done)) => done.saturating_duration_since(start).saturating_sub(dns),
            _ => Duration::ZERO,
        };
        let tls = match (marks.connected, marks.secured) {
            (Some(start), Some(done)) => done.saturating_duration_since(start),
            _ => Duration::ZERO,
        };

        PhaseTimings {
            dns,
            connect,
            tls,
            ..PhaseTimings::default()
        }
    }

    fn marks(&self) -> MutexGuard<'_, Marks> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Marks {
    fn dns(&self) -> Duration {
        match (self.dns_start, self.dns_done) {
            (Some(start), Some(done)) => done.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}
