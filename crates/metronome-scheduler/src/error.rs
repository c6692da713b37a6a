use thiserror::Error;

/// Errors surfaced from job registration.
///
/// Everything past registration (job failures, panics) is captured into the
/// entry's run log instead of being returned — see the worker dispatch in
/// [`crate::scheduler`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression did not parse.
    #[error("invalid cron spec: {0}")]
    InvalidSpec(#[from] cron::error::Error),

    /// A spec had the wrong number of fields for the configured parser.
    #[error("invalid cron spec {spec:?}: expected {expected} fields, got {got}")]
    FieldCount {
        spec: String,
        expected: usize,
        got: usize,
    },

    /// An `@every` descriptor carried an unparseable duration.
    #[error("invalid @every duration {0:?}: {1}")]
    InvalidDuration(String, humantime::DurationError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
