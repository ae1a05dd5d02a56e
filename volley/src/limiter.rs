use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run-wide request pacer shared by every worker.
///
/// Permits are handed out one at a time, at most one per `1/rate` seconds, with no burst
/// allowance. A limiter built with rate `0.` grants every permit immediately.
pub(crate) struct RateLimiter {
    inner: Option<DefaultDirectRateLimiter>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Permit {
    Granted,
    Cancelled,
}

impl RateLimiter {
    pub fn new(rate: f64) -> Self {
        let inner = (rate > 0.)
            .then(|| Duration::try_from_secs_f64(rate.recip()).ok())
            .flatten()
            .and_then(Quota::with_period)
            .map(|quota| Governor::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self { inner }
    }

    /// Wait for the next permit, giving up as soon as `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Permit {
        if cancel.is_cancelled() {
            return Permit::Cancelled;
        }

        let Some(limiter) = &self.inner else {
            return Permit::Granted;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Permit::Cancelled,
            _ = limiter.until_ready() => Permit::Granted,
        }
    }
}
