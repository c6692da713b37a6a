//! Entry records: the scheduler's bookkeeping for one registered job.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::job::Job;
use crate::schedule::Schedule;

/// How many run records an entry retains; oldest evicted first.
pub const MAX_RUN_LOGS: usize = 10;

/// Stable entry identifier. Assigned monotonically from 1; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether the run loop dispatches the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Active,
    Paused,
}

/// Record of one execution, kept in the entry's bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rendered job error; `None` on success.
    pub error: Option<String>,
}

/// Internal entry record. Only [`EntrySnapshot`] copies leave the scheduler.
pub(crate) struct Entry {
    pub id: EntryId,
    pub name: String,
    pub schedule: Arc<dyn Schedule>,
    /// The user job wrapped by the middleware chain, composed at registration.
    pub effective: Arc<dyn Job>,
    /// Next firing instant. `None` means either "not computed yet" or "never
    /// fires again"; the tick's recompute pass resolves both the same way.
    pub next: Option<DateTime<Tz>>,
    pub prev: Option<DateTime<Tz>>,
    pub state: EntryState,
    pub logs: VecDeque<RunLog>,
}

impl Entry {
    pub fn push_log(&mut self, log: RunLog) {
        self.logs.push_back(log);
        while self.logs.len() > MAX_RUN_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            name: self.name.clone(),
            next: self.next,
            prev: self.prev,
            state: self.state,
            logs: self.logs.iter().cloned().collect(),
        }
    }
}

/// Point-in-time copy of an entry, as returned by
/// [`Scheduler::entry`](crate::Scheduler::entry) and
/// [`Scheduler::entries`](crate::Scheduler::entries).
#[derive(Clone, Serialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub name: String,
    pub next: Option<DateTime<Tz>>,
    pub prev: Option<DateTime<Tz>>,
    pub state: EntryState,
    pub logs: Vec<RunLog>,
}

/// Sort key for `entries()`: ascending by next firing instant, entries that
/// never fire again last.
pub(crate) fn by_next(a: &EntrySnapshot, b: &EntrySnapshot) -> std::cmp::Ordering {
    match (a.next, b.next) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
