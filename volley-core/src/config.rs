use crate::{
    ConfigError, DEFAULT_CONCURRENCY, DEFAULT_PERCENTILES, DEFAULT_REQUESTS, DEFAULT_TIMEOUT,
    MAX_RATE, MIN_RATE,
};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpVersion {
    #[default]
    Http1,
    /// Offer HTTP/2 through ALPN on TLS connections. Plain-text targets stay on HTTP/1.1.
    Http2,
}

/// Transport toggles applied to the shared client.
#[derive(Clone, Debug)]
pub struct TransportOptions {
    pub http_version: HttpVersion,
    pub keep_alive: bool,
    pub compression: bool,
    pub follow_redirects: bool,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    /// Skip certificate verification.
    pub insecure: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            http_version: HttpVersion::Http1,
            keep_alive: true,
            compression: true,
            follow_redirects: true,
            timeout: Some(DEFAULT_TIMEOUT),
            insecure: true,
        }
    }
}

impl TransportOptions {
    pub fn http2(mut self) -> Self {
        self.http_version = HttpVersion::Http2;
        self
    }

    pub fn disable_keep_alive(mut self) -> Self {
        self.keep_alive = false;
        self
    }

    pub fn disable_compression(mut self) -> Self {
        self.compression = false;
        self
    }

    pub fn disable_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Immutable description of the request issued on every iteration.
///
/// The engine never mutates a template; each execution builds a fresh request (with its own
/// header map and body handle) from it.
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Overrides the `Host` header.
    pub host: Option<String>,
    pub proxy: Option<Uri>,
    pub transport: TransportOptions,
}

impl RequestTemplate {
    pub fn new(method: Method, url: Uri) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            host: None,
            proxy: None,
            transport: TransportOptions::default(),
        }
    }

    pub fn get(url: Uri) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn proxy(mut self, proxy: Uri) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    pub fn is_tls(&self) -> bool {
        self.url.scheme_str() == Some("https")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.url.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => return Err(ConfigError::UnsupportedScheme(other.to_string())),
            None => return Err(ConfigError::UnsupportedScheme(String::new())),
        }

        if self.url.host().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingHost(self.url.to_string()));
        }

        if let Some(host) = &self.host {
            if HeaderValue::from_str(host).is_err() {
                return Err(ConfigError::InvalidHost(host.clone()));
            }
        }

        if let Some(proxy) = &self.proxy {
            if proxy.scheme_str() != Some("http") || proxy.host().is_none() {
                return Err(ConfigError::InvalidProxy(proxy.to_string()));
            }
        }

        Ok(())
    }
}

/// How much load to generate and how fast.
///
/// A run is either count-bounded (`requests`) or, when `duration` is set, time-bounded, in
/// which case the request count is ignored.
///
/// # Example
/// ```
/// use volley_core::LoadProfile;
/// use std::time::Duration;
///
/// let profile = LoadProfile::new()
///     .concurrency(10)
///     .rate(50.)
///     .duration(Duration::from_secs(30));
/// assert!(profile.validate().is_ok());
/// assert_eq!(profile.request_budget(), None);
/// ```
#[derive(Clone, Debug)]
pub struct LoadProfile {
    pub requests: u64,
    pub concurrency: usize,
    /// Requests per second across all workers. `0.` disables pacing.
    pub rate: f64,
    pub duration: Option<Duration>,
    pub percentiles: Vec<f64>,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            requests: DEFAULT_REQUESTS,
            concurrency: DEFAULT_CONCURRENCY,
            rate: 0.,
            duration: None,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}

impl LoadProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(mut self, requests: u64) -> Self {
        self.requests = requests;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Bound the run by wall-clock time. A zero duration keeps the run count-bounded.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = (!duration.is_zero()).then_some(duration);
        self
    }

    pub fn percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = percentiles;
        self
    }

    pub fn is_timed(&self) -> bool {
        self.duration.is_some()
    }

    /// Total number of request slots, or `None` for a duration-bounded run.
    pub fn request_budget(&self) -> Option<u64> {
        if self.is_timed() {
            None
        } else {
            Some(self.requests)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        if !self.rate.is_finite()
            || self.rate < 0.
            || (self.rate > 0. && self.rate < MIN_RATE)
            || self.rate > MAX_RATE
        {
            return Err(ConfigError::InvalidRate(self.rate));
        }

        if !self.is_timed() {
            if self.requests == 0 {
                return Err(ConfigError::NoRequests);
            }

            if self.requests < self.concurrency as u64 {
                return Err(ConfigError::RequestsBelowConcurrency {
                    requests: self.requests,
                    concurrency: self.concurrency,
                });
            }
        }

        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !(**p > 0. && **p <= 1.))
        {
            return Err(ConfigError::InvalidPercentile(*p));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_concurrency() {
        let profile = LoadProfile::new().requests(10).concurrency(0);
        assert!(matches!(profile.validate(), Err(ConfigError::ZeroConcurrency)));

        let timed = LoadProfile::new()
            .concurrency(0)
            .duration(Duration::from_secs(1));
        assert!(matches!(timed.validate(), Err(ConfigError::ZeroConcurrency)));
    }

    #[test]
    fn rejects_count_below_concurrency() {
        let profile = LoadProfile::new().requests(5).concurrency(10);
        assert!(matches!(
            profile.validate(),
            Err(ConfigError::RequestsBelowConcurrency {
                requests: 5,
                concurrency: 10
            })
        ));
    }

    #[test]
    fn duration_ignores_request_count() {
        let profile = LoadProfile::new()
            .requests(1)
            .concurrency(10)
            .duration(Duration::from_secs(2));
        assert!(profile.validate().is_ok());
        assert_eq!(profile.request_budget(), None);

        let zero = LoadProfile::new().requests(100).duration(Duration::ZERO);
        assert!(!zero.is_timed());
        assert_eq!(zero.request_budget(), Some(100));
    }

    #[test]
    fn rejects_bad_rate_and_percentiles() {
        let rate = LoadProfile::new().rate(-1.);
        assert!(matches!(rate.validate(), Err(ConfigError::InvalidRate(_))));

        let glacial = LoadProfile::new().rate(1e-9);
        assert!(matches!(glacial.validate(), Err(ConfigError::InvalidRate(_))));

        let frantic = LoadProfile::new().rate(1e12);
        assert!(matches!(frantic.validate(), Err(ConfigError::InvalidRate(_))));
        assert!(LoadProfile::new().rate(MAX_RATE).validate().is_ok());

        let nan = LoadProfile::new().rate(f64::NAN);
        assert!(matches!(nan.validate(), Err(ConfigError::InvalidRate(_))));

        let pct = LoadProfile::new().percentiles(vec![0.5, 1.5]);
        assert!(matches!(
            pct.validate(),
            Err(ConfigError::InvalidPercentile(p)) if p == 1.5
        ));
    }

    #[test]
    fn template_validation() {
        let ok = RequestTemplate::get(Uri::from_static("https://example.com/"));
        assert!(ok.validate().is_ok());
        assert!(ok.is_tls());

        let scheme = RequestTemplate::get(Uri::from_static("ftp://example.com/"));
        assert!(matches!(
            scheme.validate(),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));

        let relative = RequestTemplate::get(Uri::from_static("/just/a/path"));
        assert!(relative.validate().is_err());

        let proxy = RequestTemplate::get(Uri::from_static("http://example.com/"))
            .proxy(Uri::from_static("socks5://127.0.0.1:1080"));
        assert!(matches!(
            proxy.validate(),
            Err(ConfigError::InvalidProxy(_))
        ));

        let host = RequestTemplate::get(Uri::from_static("http://example.com/")).host("bad\nhost");
        assert!(matches!(host.validate(), Err(ConfigError::InvalidHost(_))));
    }
}
