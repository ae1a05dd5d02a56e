use crate::aggregator::ResultSink;
use crate::executor::Executor;
use crate::limiter::{Permit, RateLimiter};
use crate::state::RunState;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Everything a worker needs, shared by all workers of a run.
pub(crate) struct WorkerContext {
    pub executor: Executor,
    pub limiter: RateLimiter,
    pub sink: ResultSink,
    pub state: Arc<RunState>,
    /// Reference instant for request offsets.
    pub epoch: Instant,
}

/// A fixed set of workers, each issuing one request at a time.
pub(crate) struct WorkerPool {
    workers: JoinSet<u64>,
}

impl WorkerPool {
    pub fn spawn(concurrency: usize, ctx: Arc<WorkerContext>) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            workers.spawn(worker(id, ctx.clone()));
        }
        Self { workers }
    }

    /// Wait for every worker to exit. Returns the number of requests executed.
    pub async fn join(mut self) -> u64 {
        let mut executed = 0;
        while let Some(res) = self.workers.join_next().await {
            match res {
                Ok(count) => executed += count,
                Err(err) => error!("Worker failed: {err}"),
            }
        }
        executed
    }
}

#[instrument(name = "worker", skip(ctx))]
async fn worker(id: usize, ctx: Arc<WorkerContext>) -> u64 {
    let mut executed = 0;

    while let Some(index) = ctx.state.claim() {
        // A slot claimed but never permitted is simply dropped: no result is recorded.
        if ctx.limiter.acquire(ctx.state.cancel_token()).await == Permit::Cancelled {
            trace!(index, "Run cancelled while waiting for a permit.");
            break;
        }

        ctx.state.record_dispatch();
        let result = ctx.executor.execute(index, ctx.epoch).await;
        ctx.state.record_outcome(result.is_completed());
        ctx.sink.submit(result);
        executed += 1;
    }

    trace!(executed, "Worker done.");
    executed
}
