use super::probe::TracedConn;
use super::resolver::TimedResolver;
use super::trace::{RequestTrace, REQUEST_TRACE};
use http::Uri;
use hyper_rustls::{HttpsConnector, MaybeHttpsStream};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::HttpConnector;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Service, ServiceExt};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// Opens plain TCP connections through [`TimedResolver`], marking dial-up on the request trace.
#[derive(Clone, Debug)]
pub(crate) struct WireConnector {
    http: HttpConnector<TimedResolver>,
}

impl WireConnector {
    pub fn new() -> Self {
        let mut http = HttpConnector::new_with_resolver(TimedResolver);
        http.enforce_http(false);
        http.set_nodelay(true);
        Self { http }
    }
}

impl Service<Uri> for WireConnector {
    type Response = TracedConn;
    type Error = BoxError;
    type Future = BoxFuture<TracedConn>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let http = self.http.clone();
        Box::pin(async move {
            if let Some(trace) = RequestTrace::current() {
                trace.connect_start();
            }
            let io = http.oneshot(dst).await?;
            Ok(TracedConn::new(io.into_inner()))
        })
    }
}

/// Reaches the target directly or through an HTTP forward proxy.
///
/// https targets are tunneled with `CONNECT`; plain http targets are sent to the proxy in
/// absolute form.
#[derive(Clone, Debug)]
pub(crate) struct RouteConnector {
    wire: WireConnector,
    proxy: Option<Uri>,
}

impl RouteConnector {
    pub fn new(proxy: Option<Uri>) -> Self {
        Self {
            wire: WireConnector::new(),
            proxy,
        }
    }
}

impl Service<Uri> for RouteConnector {
    type Response = TracedConn;
    type Error = BoxError;
    type Future = BoxFuture<TracedConn>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let wire = self.wire.clone();
        let proxy = self.proxy.clone();
        Box::pin(async move {
            let conn = match proxy {
                None => wire.oneshot(dst).await?,
                Some(proxy) if dst.scheme_str() == Some("https") => {
                    Tunnel::new(proxy, wire).oneshot(dst).await?
                }
                Some(proxy) => {
                    let mut conn = wire.oneshot(proxy).await?;
                    conn.set_proxied();
                    conn
                }
            };

            if let Some(trace) = RequestTrace::current() {
                trace.connected(conn.probe().id());
            }
            Ok(conn)
        })
    }
}

/// Outermost connector handed to the client.
///
/// The pool may finish a connect in the background after the request that started it has
/// moved on, so the trace captured at call time is re-scoped around the whole connect.
#[derive(Clone)]
pub(crate) struct TimedConnector {
    inner: HttpsConnector<RouteConnector>,
}

impl TimedConnector {
    pub fn new(inner: HttpsConnector<RouteConnector>) -> Self {
        Self { inner }
    }
}

impl Service<Uri> for TimedConnector {
    type Response = MaybeHttpsStream<TracedConn>;
    type Error = BoxError;
    type Future = BoxFuture<Self::Response>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let inner = self.inner.clone();
        let connect = async move {
            let stream = inner.oneshot(dst).await?;
            if let (Some(trace), MaybeHttpsStream::Https(_)) = (RequestTrace::current(), &stream) {
                trace.secured();
            }
            Ok::<_, BoxError>(stream)
        };

        match RequestTrace::current() {
            Some(trace) => Box::pin(REQUEST_TRACE.scope(trace, connect)),
            None => Box::pin(connect),
        }
    }
}
