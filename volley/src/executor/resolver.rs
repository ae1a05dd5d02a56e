use super::trace::RequestTrace;
use hyper_util::client::legacy::connect::dns::Name;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::Service;

#[derive(Debug, Error)]
#[error("failed to resolve `{host}`: {source}")]
pub(crate) struct DnsError {
    host: String,
    #[source]
    source: io::Error,
}

/// System resolver that records lookup time on the current request trace.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TimedResolver;

impl Service<Name> for TimedResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = DnsError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, name: Name) -> Self::Future {
        Box::pin(async move {
            let trace = RequestTrace::current();
            if let Some(trace) = &trace {
                trace.dns_start();
            }

            let host = name.as_str().to_string();
            let lookup = tokio::net::lookup_host((host.clone(), 0)).await;

            if let Some(trace) = &trace {
                trace.dns_done();
            }

            let addrs: Vec<SocketAddr> = match lookup {
                Ok(addrs) => addrs.collect(),
                Err(source) => return Err(DnsError { host, source }),
            };

            if addrs.is_empty() {
                return Err(DnsError {
                    host,
                    source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
                });
            }

            Ok(addrs.into_iter())
        })
    }
}
