//! The scheduler core: entry collection, the reactive run loop, and worker
//! dispatch.
//!
//! One dedicated loop task computes the earliest upcoming firing instant
//! across all active entries and sleeps until it — or until a mutation wakes
//! it through a coalescing [`Notify`], or until shutdown cancels it. Every
//! firing spawns an independent worker task, so a slow job never delays the
//! loop or other entries.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chain::{Chain, Middleware};
use crate::entry::{by_next, Entry, EntryId, EntrySnapshot, EntryState, RunLog};
use crate::error::Result;
use crate::job::{FuncJob, Job, JobContext};
use crate::schedule::{Schedule, SpecParser};

/// Sleep applied when no active entry has an upcoming firing; mutations wake
/// the loop long before this elapses.
const IDLE_SLEEP: Duration = Duration::from_secs(100_000 * 3600);

/// In-process cron scheduler.
///
/// Cheap to clone; all clones share the same entry collection. Construction
/// goes through [`Scheduler::builder`]:
///
/// ```no_run
/// use metronome_scheduler::{Scheduler, chain::{LogRuns, Recover}};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let scheduler = Scheduler::builder()
///     .middleware(Recover)
///     .middleware(LogRuns)
///     .build();
///
/// scheduler.add_fn("tick", "*/5 * * * *", |_cx| async {
///     println!("five minutes passed");
///     Ok(())
/// })?;
///
/// scheduler.start();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    location: Tz,
    parser: SpecParser,
    chain: Chain,
    state: Mutex<State>,
    /// Single-permit wake signal; concurrent mutations coalesce into one
    /// recompute.
    wakeup: Notify,
    /// Shutdown scope owning the loop and all in-flight workers.
    shutdown: CancellationToken,
}

struct State {
    entries: Vec<Entry>,
    next_id: u64,
    running: bool,
}

/// Configures a [`Scheduler`] before construction.
pub struct Builder {
    location: Tz,
    parser: SpecParser,
    chain: Chain,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            location: chrono_tz::UTC,
            parser: SpecParser::standard(),
            chain: Chain::default(),
        }
    }
}

impl Builder {
    /// Time zone all schedule computations are interpreted in. Default UTC.
    pub fn location(mut self, tz: Tz) -> Self {
        self.location = tz;
        self
    }

    /// Parse specs as 6-field expressions with a leading seconds field.
    pub fn with_seconds(mut self) -> Self {
        self.parser = SpecParser::with_seconds();
        self
    }

    /// Replace the spec parser wholesale.
    pub fn parser(mut self, parser: SpecParser) -> Self {
        self.parser = parser;
        self
    }

    /// Append a middleware; the first appended wraps outermost.
    pub fn middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.chain.push(Arc::new(m));
        self
    }

    /// Replace the middleware chain wholesale.
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler {
            inner: Arc::new(Inner {
                location: self.location,
                parser: self.parser,
                chain: self.chain,
                state: Mutex::new(State {
                    entries: Vec::new(),
                    next_id: 0,
                    running: false,
                }),
                wakeup: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler with the default configuration: UTC, standard 5-field
    /// parser, empty middleware chain.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Parse `spec` and register `job` under it. On a parse error no entry is
    /// created and no id is consumed.
    pub fn add_job(&self, name: &str, spec: &str, job: impl Job) -> Result<EntryId> {
        let schedule = self.inner.parser.parse(spec)?;
        Ok(self.register(name, schedule, Arc::new(job)))
    }

    /// [`Scheduler::add_job`] for async closures.
    pub fn add_fn<F, Fut>(&self, name: &str, spec: &str, f: F) -> Result<EntryId>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_job(name, spec, FuncJob::new(f))
    }

    /// Register a job with a pre-built schedule. Cannot fail.
    pub fn schedule(
        &self,
        name: &str,
        schedule: impl Schedule + 'static,
        job: impl Job,
    ) -> EntryId {
        self.register(name, Arc::new(schedule), Arc::new(job))
    }

    fn register(&self, name: &str, schedule: Arc<dyn Schedule>, job: Arc<dyn Job>) -> EntryId {
        let effective = self.inner.chain.apply(job);
        let id = {
            let mut st = self.inner.state.lock().unwrap();
            st.next_id += 1;
            let id = EntryId(st.next_id);
            st.entries.push(Entry {
                id,
                name: name.to_string(),
                schedule,
                effective,
                next: None,
                prev: None,
                state: EntryState::Active,
                logs: VecDeque::new(),
            });
            id
        };
        debug!(entry_id = %id, name = %name, "entry registered");
        self.inner.wakeup.notify_one();
        id
    }

    /// Detach an entry. Safe to call with an unknown id.
    pub fn remove(&self, id: EntryId) {
        {
            let mut st = self.inner.state.lock().unwrap();
            st.entries.retain(|e| e.id != id);
        }
        debug!(entry_id = %id, "entry removed");
        self.inner.wakeup.notify_one();
    }

    /// Snapshot of one entry, `None` when absent.
    pub fn entry(&self, id: EntryId) -> Option<EntrySnapshot> {
        let st = self.inner.state.lock().unwrap();
        st.entries.iter().find(|e| e.id == id).map(Entry::snapshot)
    }

    /// Snapshot of all entries, sorted by next firing instant ascending,
    /// never-firing entries last.
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let mut all: Vec<_> = {
            let st = self.inner.state.lock().unwrap();
            st.entries.iter().map(Entry::snapshot).collect()
        };
        all.sort_by(by_next);
        all
    }

    /// Stop dispatching the entry. Its `next` instant is left untouched until
    /// it is resumed.
    pub fn pause_entry(&self, id: EntryId) {
        {
            let mut st = self.inner.state.lock().unwrap();
            if let Some(e) = st.entries.iter_mut().find(|e| e.id == id) {
                e.state = EntryState::Paused;
            }
        }
        info!(entry_id = %id, "entry paused");
        self.inner.wakeup.notify_one();
    }

    /// Resume a paused entry. Its next firing instant is recomputed from the
    /// current time by the next tick, so a stale instant from the paused
    /// period is never fired as a catch-up.
    pub fn resume_entry(&self, id: EntryId) {
        {
            let mut st = self.inner.state.lock().unwrap();
            if let Some(e) = st.entries.iter_mut().find(|e| e.id == id) {
                e.state = EntryState::Active;
                e.next = None;
            }
        }
        info!(entry_id = %id, "entry resumed");
        self.inner.wakeup.notify_one();
    }

    /// Dispatch one immediate execution of the entry's effective job on a
    /// fresh worker. The entry's schedule (`next`/`prev`) is unaffected.
    pub fn run_entry(&self, id: EntryId) {
        let found = {
            let st = self.inner.state.lock().unwrap();
            st.entries
                .iter()
                .find(|e| e.id == id)
                .map(|e| (e.name.clone(), e.effective.clone()))
        };
        if let Some((name, job)) = found {
            info!(entry_id = %id, name = %name, "manual run");
            dispatch(self.inner.clone(), id, name, job);
        }
    }

    /// Spawn the run loop on a background task. Idempotent; requires a tokio
    /// runtime context.
    pub fn start(&self) {
        if !self.mark_running() {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(run_loop(inner));
    }

    /// Run the loop in the calling task until [`Scheduler::stop`]. The
    /// blocking equivalent of [`Scheduler::start`]; returns immediately if
    /// the loop is already running elsewhere.
    pub async fn run(&self) {
        if !self.mark_running() {
            return;
        }
        run_loop(self.inner.clone()).await;
    }

    fn mark_running(&self) -> bool {
        let mut st = self.inner.state.lock().unwrap();
        if st.running {
            return false;
        }
        st.running = true;
        true
    }

    /// Initiate shutdown: the run loop exits and in-flight jobs observe
    /// cancellation through their [`JobContext`]. Returns without waiting for
    /// workers to drain. Idempotent; harmless before [`Scheduler::start`].
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().unwrap().running
    }
}

async fn run_loop(inner: Arc<Inner>) {
    info!(location = %inner.location, "scheduler started");
    loop {
        let target = tick(&inner);

        let wait = match target {
            Some(t) => {
                let now = Utc::now().with_timezone(&inner.location);
                // Wall-clock instants pick the target; the sleep itself is
                // monotonic from here.
                (t - now).to_std().unwrap_or(Duration::ZERO)
            }
            None => IDLE_SLEEP,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = inner.wakeup.notified() => {}
            _ = inner.shutdown.cancelled() => break,
        }
    }
    inner.state.lock().unwrap().running = false;
    info!("scheduler stopped");
}

/// One tick: fire everything due, fill in missing `next` instants, and return
/// the earliest upcoming instant among active entries.
///
/// Timer expiry and mutation wake-ups both funnel here, so a wake-up that
/// races an entry's due instant fires the entry instead of recomputing it
/// past its slot.
fn tick(inner: &Arc<Inner>) -> Option<DateTime<Tz>> {
    let now = Utc::now().with_timezone(&inner.location);
    let mut due = Vec::new();

    let target = {
        let mut st = inner.state.lock().unwrap();
        for e in st.entries.iter_mut() {
            if e.state != EntryState::Active {
                continue;
            }
            if e.next.is_none() {
                // Newly added, just resumed, or never fires. The computation
                // is pure, so re-deriving "never" each tick is harmless.
                e.next = e.schedule.next(now);
            }
            if let Some(at) = e.next {
                if at <= now {
                    e.prev = Some(at);
                    e.next = e.schedule.next(now);
                    due.push((e.id, e.name.clone(), e.effective.clone()));
                }
            }
        }
        st.entries
            .iter()
            .filter(|e| e.state == EntryState::Active)
            .filter_map(|e| e.next)
            .min()
    };

    // Dispatch outside the lock; entries due at the same instant all fire in
    // this tick, in unspecified order.
    for (id, name, job) in due {
        debug!(entry_id = %id, name = %name, "firing");
        dispatch(inner.clone(), id, name, job);
    }

    target
}

/// Run one job execution on its own task and append the outcome to the
/// entry's log. The lock is only taken for the append; concurrent executions
/// of the same entry are allowed.
fn dispatch(inner: Arc<Inner>, id: EntryId, name: String, job: Arc<dyn Job>) {
    let cx = JobContext::new(id, name, inner.shutdown.child_token());
    tokio::spawn(async move {
        let started_at = Utc::now();
        let result = job.run(cx).await;
        let finished_at = Utc::now();
        let error = result.err().map(|e| format!("{e:#}"));

        let mut st = inner.state.lock().unwrap();
        if let Some(e) = st.entries.iter_mut().find(|e| e.id == id) {
            e.push_log(RunLog {
                started_at,
                finished_at,
                error,
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let s = Scheduler::new();
        let a = s.add_fn("a", "* * * * *", |_| async { Ok(()) }).unwrap();
        let b = s.add_fn("b", "* * * * *", |_| async { Ok(()) }).unwrap();
        let c = s
            .schedule("c", crate::schedule::Every::new(Duration::from_secs(60)), FuncJob::new(|_| async { Ok(()) }));
        assert!(a < b && b < c);
    }

    #[test]
    fn failed_parse_consumes_no_id() {
        let s = Scheduler::new();
        assert!(s.add_fn("bad", "this will not parse", |_| async { Ok(()) }).is_err());
        let id = s.add_fn("good", "* * * * *", |_| async { Ok(()) }).unwrap();
        assert_eq!(id, EntryId(1));
    }

    #[test]
    fn removed_entries_disappear_from_snapshots() {
        let s = Scheduler::new();
        let id = s.add_fn("gone", "* * * * *", |_| async { Ok(()) }).unwrap();
        assert!(s.entry(id).is_some());
        s.remove(id);
        assert!(s.entry(id).is_none());
        // Removing again is a no-op.
        s.remove(id);
        assert!(s.entries().is_empty());
    }

    #[test]
    fn pause_and_resume_flip_state() {
        let s = Scheduler::new();
        let id = s.add_fn("p", "* * * * *", |_| async { Ok(()) }).unwrap();
        assert_eq!(s.entry(id).unwrap().state, EntryState::Active);
        s.pause_entry(id);
        assert_eq!(s.entry(id).unwrap().state, EntryState::Paused);
        s.resume_entry(id);
        assert_eq!(s.entry(id).unwrap().state, EntryState::Active);
        // Unknown ids are ignored.
        s.pause_entry(EntryId(999));
    }

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let s = Scheduler::new();
        s.stop();
        s.stop();
        assert!(!s.is_running());
    }
}
