//! Timed request execution.
//!
//! Every request runs inside a fresh [`trace::RequestTrace`] scope. The resolver and the
//! connector stack record DNS, dial-up and TLS marks on it, and tag each connection with a
//! [`probe::WireProbe`] that the client surfaces on the response. A connection's handshake is
//! only charged to the request whose trace opened it; requests served by pooled connections
//! report zero for those phases.
mod connector;
mod probe;
mod resolver;
mod tls;
mod trace;

use connector::{RouteConnector, TimedConnector};
use probe::ConnProbe;
use resolver::DnsError;
use trace::{RequestTrace, REQUEST_TRACE};

use bytes::Bytes;
use http::header::{HeaderValue, CONNECTION, HOST};
use http::{HeaderMap, Method, Request, Uri, Version};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::{Decompression, DecompressionLayer};
use tower_http::follow_redirect::policy::Limited;
use tower_http::follow_redirect::{FollowRedirect, FollowRedirectLayer};
use volley_core::{
    ConfigError, ErrorKind, HttpVersion, PhaseTimings, RequestError, RequestResult,
    RequestTemplate, TransportOptions, REDIRECT_LIMIT,
};

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

type HttpClient = Client<TimedConnector, Full<Bytes>>;
type HttpService = FollowRedirect<Decompression<HttpClient>, Limited>;

/// Issues requests built from one template over a shared, pooling client.
#[derive(Clone)]
pub(crate) struct Executor {
    service: HttpService,
    method: Method,
    url: Uri,
    headers: HeaderMap,
    body: Bytes,
    timeout: Option<Duration>,
}

impl Executor {
    /// `pool_size` is the number of idle connections kept per host when keep-alive is on.
    pub fn new(template: &RequestTemplate, pool_size: usize) -> Result<Self, ConfigError> {
        template.validate()?;
        let transport = &template.transport;

        let mut headers = template.headers.clone();
        if let Some(host) = &template.host {
            let host =
                HeaderValue::from_str(host).map_err(|_| ConfigError::InvalidHost(host.clone()))?;
            headers.insert(HOST, host);
        }
        // Connection-specific headers are illegal in HTTP/2.
        if !transport.keep_alive && transport.http_version == HttpVersion::Http1 {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }

        Ok(Self {
            service: build_service(template.proxy.clone(), transport, pool_size)?,
            method: template.method.clone(),
            url: template.url.clone(),
            headers,
            body: template.body.clone(),
            timeout: transport.timeout,
        })
    }

    /// Run request `index`, with its offset measured from `epoch`. Never fails: transport
    /// errors and timeouts are captured in the returned result.
    pub async fn execute(&self, index: u64, epoch: Instant) -> RequestResult {
        let trace = Arc::new(RequestTrace::default());
        let start = Instant::now();
        let offset = start.saturating_duration_since(epoch);

        let exchange = REQUEST_TRACE.scope(trace.clone(), self.exchange());
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| Err(RequestError::timeout(limit))),
            None => exchange.await,
        };
        let duration = start.elapsed();

        let result = match outcome {
            Ok(exchange) => RequestResult::completed(
                index,
                offset,
                duration,
                exchange.phases(start, &trace),
                exchange.status,
                exchange.size,
            ),
            Err(error) => {
                trace!(index, %error, "Request failed.");
                RequestResult::failed(index, offset, duration, trace.partial(), error)
            }
        };

        #[cfg(feature = "metrics")]
        record_metrics(&result);

        result
    }

    fn request(&self) -> Request<Full<Bytes>> {
        let mut request = Request::new(Full::new(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.url.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }

    async fn exchange(&self) -> Result<Exchange, RequestError> {
        let response = self
            .service
            .clone()
            .oneshot(self.request())
            .await
            .map_err(|err| request_error(&err))?;

        let headers_at = Instant::now();
        let status = response.status().as_u16();
        let version = response.version();
        let probe = response.extensions().get::<ConnProbe>().cloned();

        let mut body = pin!(response.into_body());
        let mut size = 0;
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|err| request_error(&*err))?;
            if let Some(data) = frame.data_ref() {
                size += data.len() as u64;
            }
        }

        Ok(Exchange {
            status,
            size,
            version,
            probe,
            headers_at,
            done_at: Instant::now(),
        })
    }
}

fn build_service(
    proxy: Option<Uri>,
    transport: &TransportOptions,
    pool_size: usize,
) -> Result<HttpService, ConfigError> {
    let builder = HttpsConnectorBuilder::new()
        .with_tls_config(tls::client_config(transport)?)
        .https_or_http()
        .enable_http1();
    let route = RouteConnector::new(proxy);
    let https = match transport.http_version {
        HttpVersion::Http1 => builder.wrap_connector(route),
        HttpVersion::Http2 => builder.enable_http2().wrap_connector(route),
    };

    let idle = if transport.keep_alive { pool_size } else { 0 };
    let client = Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(idle)
        .build(TimedConnector::new(https));

    let redirects = if transport.follow_redirects {
        REDIRECT_LIMIT
    } else {
        0
    };
    let compression = transport.compression;

    Ok(ServiceBuilder::new()
        .layer(FollowRedirectLayer::with_policy(Limited::new(redirects)))
        .layer(
            DecompressionLayer::new()
                .gzip(compression)
                .deflate(compression)
                .br(compression),
        )
        .service(client))
}

struct Exchange {
    status: u16,
    size: u64,
    version: Version,
    probe: Option<ConnProbe>,
    headers_at: Instant,
    done_at: Instant,
}

impl Exchange {
    fn phases(&self, start: Instant, trace: &RequestTrace) -> PhaseTimings {
        let mut phases = PhaseTimings::default();

        let handshake = self
            .probe
            .as_ref()
            .and_then(|ConnProbe(probe)| trace.handshake(probe.id()));
        let ready = match handshake {
            Some(handshake) => {
                phases.dns = handshake.dns;
                phases.connect = handshake.connect;
                phases.tls = handshake.tls;
                handshake.ready.max(start)
            }
            None => start,
        };

        // HTTP/2 multiplexes streams over one socket, so socket activity can't be attributed.
        let wire = self
            .probe
            .as_ref()
            .filter(|_| self.version == Version::HTTP_11 || self.version == Version::HTTP_10)
            .and_then(|ConnProbe(probe)| probe.exchange_since(ready))
            .filter(|(_, first_byte)| *first_byte <= self.done_at);

        match wire {
            Some((written, first_byte)) => {
                phases.write = written.saturating_duration_since(ready);
                phases.wait = first_byte.saturating_duration_since(written);
                phases.read = self.done_at.saturating_duration_since(first_byte);
            }
            None => {
                phases.wait = self.headers_at.saturating_duration_since(ready);
                phases.read = self.done_at.saturating_duration_since(self.headers_at);
            }
        }

        phases
    }
}

fn request_error(err: &(dyn StdError + 'static)) -> RequestError {
    RequestError::new(classify(err), describe(err))
}

/// Error message including every cause, e.g.
/// `client error (Connect): tcp connect error: Connection refused (os error 111)`.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

pub(crate) fn classify(err: &(dyn StdError + 'static)) -> ErrorKind {
    let mut saw_http = false;
    match scan(err, &mut saw_http) {
        Some(kind) => kind,
        None if saw_http => ErrorKind::Http,
        None => ErrorKind::Other,
    }
}

fn scan(err: &(dyn StdError + 'static), saw_http: &mut bool) -> Option<ErrorKind> {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<DnsError>() {
            return Some(ErrorKind::Dns);
        }
        if err.is::<rustls::Error>() {
            return Some(ErrorKind::Tls);
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::ConnectionRefused => return Some(ErrorKind::ConnectionRefused),
                io::ErrorKind::TimedOut => return Some(ErrorKind::Timeout),
                _ => {}
            }
            // io::Error hides its payload from `source()`.
            if let Some(kind) = io.get_ref().and_then(|inner| scan(inner, saw_http)) {
                return Some(kind);
            }
        }
        if let Some(hyper) = err.downcast_ref::<hyper::Error>() {
            if hyper.is_timeout() {
                return Some(ErrorKind::Timeout);
            }
            *saw_http = true;
        }
        current = err.source();
    }
    None
}

#[cfg(feature = "metrics")]
fn record_metrics(result: &RequestResult) {
    metrics::histogram!("volley_request_latency").record(result.duration.as_secs_f64());
    if result.is_completed() {
        metrics::counter!("volley_request_success").increment(1);
    } else {
        metrics::counter!("volley_request_error").increment(1);
    }
}
