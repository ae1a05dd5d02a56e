use crate::report::OutputFormat;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use http::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{Method, Uri};
use std::path::PathBuf;
use std::time::Duration;
use volley::{DEFAULT_CONCURRENCY, DEFAULT_REQUESTS, USER_AGENT as VOLLEY_UA};
use volley::{LoadProfile, RequestTemplate, TransportOptions};

/// Send some load to a web application.
#[derive(Parser, Debug)]
#[command(name = "volley", version)]
pub struct Cli {
    /// Target URL.
    pub url: String,

    /// Number of requests to run.
    #[arg(short = 'n', default_value_t = DEFAULT_REQUESTS)]
    pub requests: u64,

    /// Number of workers to run concurrently. Total requests cannot be smaller than this.
    #[arg(short = 'c', default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Rate limit in requests per second, shared by all workers. 0 means no limit.
    #[arg(short = 'q', default_value_t = 0.)]
    pub rate: f64,

    /// Duration of the run (e.g. 10s, 3m). When set, -n is ignored.
    #[arg(short = 'z', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Output type. Prints a summary by default; "csv" dumps one row per response.
    #[arg(short = 'o', value_enum, default_value_t = OutputFormat::Summary)]
    pub output: OutputFormat,

    /// HTTP method.
    #[arg(short = 'm', default_value = "GET")]
    pub method: String,

    /// Custom HTTP header, e.g. -H "Accept: text/html". Repeatable.
    #[arg(short = 'H', value_parser = parse_header)]
    pub headers: Vec<(HeaderName, HeaderValue)>,

    /// Timeout for each request in seconds. 0 means no timeout.
    #[arg(short = 't', default_value_t = 20)]
    pub timeout: u64,

    /// HTTP Accept header.
    #[arg(short = 'A')]
    pub accept: Option<String>,

    /// HTTP request body.
    #[arg(short = 'd', conflicts_with = "body_file")]
    pub body: Option<String>,

    /// HTTP request body read from a file.
    #[arg(short = 'D')]
    pub body_file: Option<PathBuf>,

    /// Content-type.
    #[arg(short = 'T', default_value = "text/html")]
    pub content_type: String,

    /// Basic authentication, username:password.
    #[arg(short = 'a')]
    pub basic_auth: Option<String>,

    /// HTTP proxy address as host:port or http://host:port.
    #[arg(short = 'x')]
    pub proxy: Option<String>,

    /// Enable HTTP/2.
    #[arg(long = "h2")]
    pub http2: bool,

    /// HTTP Host header.
    #[arg(long)]
    pub host: Option<String>,

    /// Disable compression.
    #[arg(long)]
    pub disable_compression: bool,

    /// Disable keep-alive, forcing a new TCP connection per request.
    #[arg(long = "disable-keepalive")]
    pub disable_keep_alive: bool,

    /// Disable following of HTTP redirects.
    #[arg(long)]
    pub disable_redirects: bool,

    /// Verify server certificates instead of accepting any.
    #[arg(long)]
    pub verify_certs: bool,

    /// Number of worker threads used by the runtime. Defaults to the number of cores.
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub cpus: Option<usize>,

    /// Log engine activity to stderr. RUST_LOG overrides this.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn load_profile(&self) -> LoadProfile {
        let profile = LoadProfile::new()
            .requests(self.requests)
            .concurrency(self.concurrency)
            .rate(self.rate);

        match self.duration {
            Some(duration) => profile.duration(duration),
            None => profile,
        }
    }

    pub fn transport(&self) -> TransportOptions {
        let mut transport = TransportOptions::default()
            .timeout((self.timeout > 0).then(|| Duration::from_secs(self.timeout)))
            .insecure(!self.verify_certs);
        if self.http2 {
            transport = transport.http2();
        }
        if self.disable_keep_alive {
            transport = transport.disable_keep_alive();
        }
        if self.disable_compression {
            transport = transport.disable_compression();
        }
        if self.disable_redirects {
            transport = transport.disable_redirects();
        }
        transport
    }

    pub async fn request_template(&self) -> Result<RequestTemplate> {
        let url: Uri = self
            .url
            .parse()
            .with_context(|| format!("Invalid URL `{}`", self.url))?;
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .with_context(|| format!("Invalid method `{}`", self.method))?;

        let mut template = RequestTemplate::new(method, url)
            .body(self.body().await?)
            .transport(self.transport())
            .header(CONTENT_TYPE, header_value(&self.content_type)?);

        for (name, value) in &self.headers {
            template = template.header(name.clone(), value.clone());
        }

        if let Some(accept) = &self.accept {
            template = template.header(ACCEPT, header_value(accept)?);
        }

        if let Some(credentials) = &self.basic_auth {
            template = template.header(AUTHORIZATION, basic_auth(credentials)?);
        }

        let user_agent = match template.headers.get(USER_AGENT).map(HeaderValue::to_str) {
            Some(Ok(custom)) => format!("{custom} {VOLLEY_UA}"),
            _ => VOLLEY_UA.to_string(),
        };
        template = template.header(USER_AGENT, header_value(&user_agent)?);

        if let Some(host) = &self.host {
            template = template.host(host.clone());
        }

        if let Some(proxy) = &self.proxy {
            template = template.proxy(proxy_uri(proxy)?);
        }

        Ok(template)
    }

    async fn body(&self) -> Result<Bytes> {
        if let Some(body) = &self.body {
            return Ok(Bytes::from(body.clone()));
        }

        match &self.body_file {
            Some(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .with_context(|| format!("Failed to read body from {}", path.display())),
            None => Ok(Bytes::new()),
        }
    }
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("`{raw}` is not of the form `Name: value`"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| e.to_string())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).with_context(|| format!("Invalid header value `{value}`"))
}

fn basic_auth(credentials: &str) -> Result<HeaderValue> {
    match credentials.split_once(':') {
        Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {
            header_value(&format!("Basic {}", STANDARD.encode(credentials)))
        }
        _ => Err(anyhow!("Basic auth must be given as username:password")),
    }
}

fn proxy_uri(proxy: &str) -> Result<Uri> {
    let proxy = if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    };
    proxy
        .parse()
        .with_context(|| format!("Invalid proxy `{proxy}`"))
}
