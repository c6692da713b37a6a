use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entry::EntryId;

/// Execution context handed to every job invocation.
///
/// The cancellation token is a child of the scheduler's shutdown scope: it is
/// cancelled by [`Scheduler::stop`](crate::Scheduler::stop), never by callers
/// of `start`/`run`. Long-running jobs should poll it at their own
/// suspension points.
#[derive(Clone)]
pub struct JobContext {
    pub entry_id: EntryId,
    pub name: String,
    cancel: CancellationToken,
}

impl JobContext {
    pub(crate) fn new(entry_id: EntryId, name: String, cancel: CancellationToken) -> Self {
        Self {
            entry_id,
            name,
            cancel,
        }
    }

    /// True once the scheduler has been stopped.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the scheduler is stopped.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// A schedulable unit of work.
///
/// The error is recorded in the entry's run log; it does not affect the
/// scheduler or other entries.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self, cx: JobContext) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Job`].
pub struct FuncJob<F>(F);

impl<F> FuncJob<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Job for FuncJob<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, cx: JobContext) -> anyhow::Result<()> {
        (self.0)(cx).await
    }
}

/// Box a closure as a shareable job. Convenience for `schedule()` call sites.
pub fn func_job<F, Fut>(f: F) -> Arc<dyn Job>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FuncJob::new(f))
}
