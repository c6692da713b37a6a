//! Middleware: `Job -> Job` wrappers composed around every registered job.
//!
//! The chain is fixed at scheduler construction and applied once per entry at
//! registration; the first middleware added is the outermost wrapper.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info};

use crate::job::{Job, JobContext};

/// Transforms a job into a wrapped job.
pub trait Middleware: Send + Sync {
    fn wrap(&self, job: Arc<dyn Job>) -> Arc<dyn Job>;
}

/// Ordered middleware composition.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    pub(crate) fn push(&mut self, m: Arc<dyn Middleware>) {
        self.middlewares.push(m);
    }

    /// Compose `m1(m2(…mk(job)…))` — the first middleware ends up outermost.
    pub fn apply(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        self.middlewares
            .iter()
            .rev()
            .fold(job, |inner, m| m.wrap(inner))
    }
}

/// Catches panics from the wrapped job and converts them into returned
/// errors, so a panicking job lands in the entry's run log instead of
/// killing its worker task silently.
pub struct Recover;

impl Middleware for Recover {
    fn wrap(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        Arc::new(RecoverJob { inner: job })
    }
}

struct RecoverJob {
    inner: Arc<dyn Job>,
}

#[async_trait]
impl Job for RecoverJob {
    async fn run(&self, cx: JobContext) -> anyhow::Result<()> {
        let entry_id = cx.entry_id;
        let name = cx.name.clone();
        match AssertUnwindSafe(self.inner.run(cx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "non-string panic payload".to_string()
                };
                error!(entry_id = %entry_id, job = %name, panic = %msg, "job panicked");
                Err(anyhow!("panic: {msg}"))
            }
        }
    }
}

/// Traces every execution of the wrapped job: a debug record on start, an
/// info/error record with the elapsed time on finish.
pub struct LogRuns;

impl Middleware for LogRuns {
    fn wrap(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        Arc::new(LoggedJob { inner: job })
    }
}

struct LoggedJob {
    inner: Arc<dyn Job>,
}

#[async_trait]
impl Job for LoggedJob {
    async fn run(&self, cx: JobContext) -> anyhow::Result<()> {
        let entry_id = cx.entry_id;
        let name = cx.name.clone();
        debug!(entry_id = %entry_id, job = %name, "job starting");
        let started = Instant::now();
        let result = self.inner.run(cx).await;
        let elapsed = started.elapsed();
        match &result {
            Ok(()) => info!(entry_id = %entry_id, job = %name, ?elapsed, "job finished"),
            Err(e) => error!(entry_id = %entry_id, job = %name, ?elapsed, error = %format!("{e:#}"), "job failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryId;
    use crate::job::func_job;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    fn cx() -> JobContext {
        JobContext::new(EntryId(1), "test".into(), CancellationToken::new())
    }

    /// Middleware that records its tag before delegating, to observe ordering.
    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Tag {
        fn wrap(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
            let tag = self.0;
            let seen = self.1.clone();
            func_job(move |cx| {
                let job = job.clone();
                let seen = seen.clone();
                seen.lock().unwrap().push(tag);
                async move { job.run(cx).await }
            })
        }
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new(vec![
            Arc::new(Tag("outer", seen.clone())),
            Arc::new(Tag("inner", seen.clone())),
        ]);
        let job = chain.apply(func_job(|_| async { Ok(()) }));
        job.run(cx()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn recover_turns_panic_into_error() {
        let job = Recover.wrap(func_job(|_| async { panic!("YOLO") }));
        let err = job.run(cx()).await.unwrap_err();
        assert!(err.to_string().contains("YOLO"));
    }

    #[tokio::test]
    async fn recover_passes_through_success_and_errors() {
        let ok = Recover.wrap(func_job(|_| async { Ok(()) }));
        assert!(ok.run(cx()).await.is_ok());

        let failing = Recover.wrap(func_job(|_| async { Err(anyhow!("plain failure")) }));
        let err = failing.run(cx()).await.unwrap_err();
        assert_eq!(err.to_string(), "plain failure");
    }
}
