//! `metronome-scheduler` — in-process cron scheduler on Tokio.
//!
//! # Overview
//!
//! Named jobs are registered against firing schedules (cron expressions,
//! `@every` intervals, or custom [`Schedule`] implementations). A single run
//! loop sleeps until the earliest upcoming instant across all active entries
//! and is woken early by any mutation, so additions, removals, and
//! pause/resume take effect without polling. Each firing spawns an
//! independent worker through the middleware chain; outcomes land in the
//! entry's bounded run history.
//!
//! # Entry operations
//!
//! | Operation         | Behaviour                                            |
//! |-------------------|------------------------------------------------------|
//! | `add_job`/`add_fn`| Parse a spec, register an active entry               |
//! | `schedule`        | Register with a pre-built schedule, infallible       |
//! | `remove`          | Detach an entry                                      |
//! | `pause_entry`     | Skip the entry without advancing its schedule        |
//! | `resume_entry`    | Re-activate; next instant recomputed from now        |
//! | `run_entry`       | One immediate execution, schedule untouched          |
//! | `entry`/`entries` | Point-in-time snapshots, sorted by next firing       |
//!
//! Schedules are interpreted in the scheduler's configured time zone; firing
//! decisions compare absolute instants, so DST transitions neither skip nor
//! double-fire.

pub mod chain;
pub mod entry;
pub mod error;
pub mod job;
pub mod schedule;
pub mod scheduler;

pub use chain::{Chain, LogRuns, Middleware, Recover};
pub use entry::{EntryId, EntrySnapshot, EntryState, RunLog, MAX_RUN_LOGS};
pub use error::{Result, SchedulerError};
pub use job::{func_job, FuncJob, Job, JobContext};
pub use schedule::{CronSchedule, Every, Schedule, SpecParser};
pub use scheduler::{Builder, Scheduler};
