use hyper::rt::ReadBufCursor;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use pin_project::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Per-connection record of the latest write and of the first read that followed it.
#[derive(Debug)]
pub(crate) struct WireProbe {
    id: u64,
    epoch: Instant,
    // Nanoseconds since `epoch`, 0 when unset.
    last_write: AtomicU64,
    first_read: AtomicU64,
    awaiting_read: AtomicBool,
}

impl WireProbe {
    fn new() -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            epoch: Instant::now(),
            last_write: AtomicU64::new(0),
            first_read: AtomicU64::new(0),
            awaiting_read: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Write and first-response-byte instants of the last exchange, if it started at or
    /// after `since`.
    pub fn exchange_since(&self, since: Instant) -> Option<(Instant, Instant)> {
        let written = self.instant(&self.last_write)?;
        let first_read = self.instant(&self.first_read)?;
        (written >= since && first_read >= written).then_some((written, first_read))
    }

    fn on_write(&self) {
        self.last_write.store(self.stamp(), Ordering::Release);
        self.awaiting_read.store(true, Ordering::Release);
    }

    fn on_read(&self) {
        if self.awaiting_read.swap(false, Ordering::AcqRel) {
            self.first_read.store(self.stamp(), Ordering::Release);
        }
    }

    fn stamp(&self) -> u64 {
        (self.epoch.elapsed().as_nanos() as u64).max(1)
    }

    fn instant(&self, mark: &AtomicU64) -> Option<Instant> {
        match mark.load(Ordering::Acquire) {
            0 => None,
            nanos => Some(self.epoch + Duration::from_nanos(nanos)),
        }
    }
}

/// Attached to every response served over a probed connection.
#[derive(Clone, Debug)]
pub(crate) struct ConnProbe(pub Arc<WireProbe>);

#[pin_project]
pub(crate) struct ProbedStream<T> {
    #[pin]
    inner: T,
    probe: Arc<WireProbe>,
}

impl<T: AsyncRead> AsyncRead for ProbedStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let res = this.inner.poll_read(cx, buf);
        if matches!(res, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.probe.on_read();
        }
        res
    }
}

impl<T: AsyncWrite> AsyncWrite for ProbedStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let res = this.inner.poll_write(cx, buf);
        if matches!(res, Poll::Ready(Ok(n)) if n > 0) {
            this.probe.on_write();
        }
        res
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let res = this.inner.poll_write_vectored(cx, bufs);
        if matches!(res, Poll::Ready(Ok(n)) if n > 0) {
            this.probe.on_write();
        }
        res
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

/// TCP connection handed to the HTTP client, carrying its probe.
pub(crate) struct TracedConn {
    io: TokioIo<ProbedStream<TcpStream>>,
    proxied: bool,
}

impl TracedConn {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            io: TokioIo::new(ProbedStream {
                inner: stream,
                probe: Arc::new(WireProbe::new()),
            }),
            proxied: false,
        }
    }

    pub fn probe(&self) -> &Arc<WireProbe> {
        &self.io.inner().probe
    }

    /// Requests on this connection go to a forward proxy in absolute form.
    pub fn set_proxied(&mut self) {
        self.proxied = true;
    }
}

impl Connection for TracedConn {
    fn connected(&self) -> Connected {
        let stream = self.io.inner();
        stream
            .inner
            .connected()
            .proxy(self.proxied)
            .extra(ConnProbe(stream.probe.clone()))
    }
}

impl hyper::rt::Read for TracedConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.io), cx, buf)
    }
}

impl hyper::rt::Write for TracedConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.io), cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write_vectored(Pin::new(&mut self.io), cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        hyper::rt::Write::is_write_vectored(&self.io)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.io), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.io), cx)
    }
}
