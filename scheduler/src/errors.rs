//! Custom error types for the instance scheduler
//!
//! Provides structured error handling with context for different failure scenarios.

use std::fmt;

/// Main error type for the scheduler
#[derive(Debug)]
pub enum SchedulerError {
    /// Cron expression parsing/validation errors
    Cron(CronError),

    /// Period definition errors
    Period(PeriodError),

    /// Schedule definition/evaluation errors
    Schedule(ScheduleError),

    /// Definition/state store errors
    Store(StoreError),

    /// Service adapter errors
    Adapter(AdapterError),

    /// Per-resource decision engine errors
    Decision(DecisionError),

    /// Scheduling-request executor errors
    Executor(ExecutorError),

    /// Other errors with context
    Other(String),
}

/// Cron expression parser/validator error variants
#[derive(Debug)]
pub enum CronError {
    /// A field expression had no recognizable tokens
    EmptyExpression,

    /// A token could not be parsed under any recognized grammar rule
    InvalidToken(String),

    /// A numeric value fell outside the field's valid range
    OutOfRange { value: u32, min: u32, max: u32 },

    /// A range's start exceeded its end (wrapping ranges are rejected)
    InvalidRange { start: u32, end: u32 },

    /// A range/step interval of zero
    InvalidInterval,

    /// An `Nth` weekday occurrence outside `[1, 5]`
    InvalidOccurrence(u32),

    /// A variant used in a field that does not accept it (e.g. `L` in months)
    DisallowedInField { token: String, field: &'static str },
}

/// Period definition error variants
#[derive(Debug)]
pub enum PeriodError {
    /// Neither a time constraint nor a calendar constraint was given
    NoConstraints { name: String },

    /// `begintime >= endtime`
    BeginNotBeforeEnd {
        name: String,
        begin: String,
        end: String,
    },

    /// A time string was not `HH:MM`
    InvalidTime { name: String, value: String },

    /// A months/monthdays/weekdays expression failed to parse or validate
    UnknownCronField(CronError),
}

/// Schedule definition/evaluation error variants
#[derive(Debug)]
pub enum ScheduleError {
    /// A period referenced by name does not exist in the period store
    UnknownPeriod { schedule: String, period: String },

    /// Both `override_status` and a non-empty period list were given
    OverrideAndPeriodsConflict { schedule: String },

    /// The IANA timezone name did not resolve
    UnknownTimezone { schedule: String, timezone: String },

    /// Neither `override_status` nor any periods were given
    NoPeriodsOrOverride { schedule: String },
}

/// Definition/state store error variants
#[derive(Debug)]
pub enum StoreError {
    /// Put without `overwrite` against an existing key
    AlreadyExists { kind: &'static str, key: String },

    /// Delete/find against a missing key where absence is an error
    NotFound { kind: &'static str, key: String },

    /// The underlying backend (sqlx, filesystem) reported a failure
    Backend { reason: String },

    /// JSON (de)serialization of a stored value failed
    Serialization { reason: String },
}

/// Service adapter error variants
#[derive(Debug)]
pub enum AdapterError {
    /// Insufficient-capacity class error from a start call; retryable via ICE
    CapacityUnavailable { preferred_sizes: Vec<String> },

    /// Transient/throttling error; retryable with backoff
    ThrottlingOrTransient { retry_after_seconds: Option<u64> },

    /// Terminal for the target: the assumed role lacks permission
    PermissionDenied { target: String },

    /// Terminal for the instance: adapter does not recognize the resource family
    AdapterUnknown { service: String },

    /// Terminal for the call: deadline exceeded
    TimedOut { operation: String },

    /// Any other terminal adapter failure
    Terminal { reason: String },
}

/// Per-resource decision engine error variants
#[derive(Debug)]
pub enum DecisionError {
    /// The resource's schedule tag did not resolve to a known schedule
    UnknownSchedule { tag_value: String },

    /// A required piece of configuration was missing for the decision
    ConfigMissing { field: &'static str },
}

/// Scheduling-request executor error variants
#[derive(Debug)]
pub enum ExecutorError {
    /// `current_dt` on the request was not timezone-aware
    NotTimezoneAware,

    /// The target already has an active scheduling pass in flight
    TargetBusy { target: String },

    /// Adapter enumeration failed; fatal for the pass
    EnumerationFailed { reason: String },

    /// Cross-account role assumption failed; fatal for the pass
    RoleAssumptionFailed { account: String, reason: String },
}

// Implement Display for all error types
impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Cron(e) => write!(f, "cron expression error: {}", e),
            SchedulerError::Period(e) => write!(f, "period error: {}", e),
            SchedulerError::Schedule(e) => write!(f, "schedule error: {}", e),
            SchedulerError::Store(e) => write!(f, "store error: {}", e),
            SchedulerError::Adapter(e) => write!(f, "adapter error: {}", e),
            SchedulerError::Decision(e) => write!(f, "decision error: {}", e),
            SchedulerError::Executor(e) => write!(f, "executor error: {}", e),
            SchedulerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronError::EmptyExpression => write!(f, "expression has no tokens"),
            CronError::InvalidToken(t) => write!(f, "invalid token: '{}'", t),
            CronError::OutOfRange { value, min, max } => {
                write!(f, "value {} out of range [{}, {}]", value, min, max)
            }
            CronError::InvalidRange { start, end } => {
                write!(f, "range start {} is greater than end {}", start, end)
            }
            CronError::InvalidInterval => write!(f, "step interval must be non-zero"),
            CronError::InvalidOccurrence(n) => {
                write!(f, "occurrence {} is outside the valid range [1, 5]", n)
            }
            CronError::DisallowedInField { token, field } => {
                write!(f, "'{}' is not allowed in the {} field", token, field)
            }
        }
    }
}

impl fmt::Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::NoConstraints { name } => {
                write!(f, "period '{}' has no time or calendar constraint", name)
            }
            PeriodError::BeginNotBeforeEnd { name, begin, end } => write!(
                f,
                "period '{}' has begintime {} not before endtime {}",
                name, begin, end
            ),
            PeriodError::InvalidTime { name, value } => {
                write!(f, "period '{}' has invalid time value '{}'", name, value)
            }
            PeriodError::UnknownCronField(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::UnknownPeriod { schedule, period } => write!(
                f,
                "schedule '{}' references unknown period '{}'",
                schedule, period
            ),
            ScheduleError::OverrideAndPeriodsConflict { schedule } => write!(
                f,
                "schedule '{}' sets both override_status and periods",
                schedule
            ),
            ScheduleError::UnknownTimezone { schedule, timezone } => write!(
                f,
                "schedule '{}' has unrecognized timezone '{}'",
                schedule, timezone
            ),
            ScheduleError::NoPeriodsOrOverride { schedule } => write!(
                f,
                "schedule '{}' has neither override_status nor periods",
                schedule
            ),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyExists { kind, key } => {
                write!(f, "{} '{}' already exists", kind, key)
            }
            StoreError::NotFound { kind, key } => write!(f, "{} '{}' not found", kind, key),
            StoreError::Backend { reason } => write!(f, "store backend error: {}", reason),
            StoreError::Serialization { reason } => write!(f, "serialization error: {}", reason),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::CapacityUnavailable { preferred_sizes } => write!(
                f,
                "insufficient capacity (preferred sizes: {})",
                preferred_sizes.join(", ")
            ),
            AdapterError::ThrottlingOrTransient {
                retry_after_seconds,
            } => match retry_after_seconds {
                Some(s) => write!(f, "throttled, retry after {}s", s),
                None => write!(f, "transient adapter error"),
            },
            AdapterError::PermissionDenied { target } => {
                write!(f, "permission denied for target '{}'", target)
            }
            AdapterError::AdapterUnknown { service } => {
                write!(f, "no adapter registered for service '{}'", service)
            }
            AdapterError::TimedOut { operation } => {
                write!(f, "operation '{}' timed out", operation)
            }
            AdapterError::Terminal { reason } => write!(f, "{}", reason),
        }
    }
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionError::UnknownSchedule { tag_value } => {
                write!(f, "unknown schedule '{}'", tag_value)
            }
            DecisionError::ConfigMissing { field } => {
                write!(f, "missing required configuration field '{}'", field)
            }
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::NotTimezoneAware => write!(
                f,
                "current_dt on the scheduling request is not timezone-aware"
            ),
            ExecutorError::TargetBusy { target } => write!(
                f,
                "target '{}' already has a scheduling pass in flight",
                target
            ),
            ExecutorError::EnumerationFailed { reason } => {
                write!(f, "resource enumeration failed: {}", reason)
            }
            ExecutorError::RoleAssumptionFailed { account, reason } => write!(
                f,
                "role assumption failed for account '{}': {}",
                account, reason
            ),
        }
    }
}

// Implement std::error::Error
impl std::error::Error for SchedulerError {}
impl std::error::Error for CronError {}
impl std::error::Error for PeriodError {}
impl std::error::Error for ScheduleError {}
impl std::error::Error for StoreError {}
impl std::error::Error for AdapterError {}
impl std::error::Error for DecisionError {}
impl std::error::Error for ExecutorError {}

// Conversion from anyhow::Error for glue code
impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Other(err.to_string())
    }
}

// Conversion helpers for sub-errors
impl From<CronError> for SchedulerError {
    fn from(err: CronError) -> Self {
        SchedulerError::Cron(err)
    }
}

impl From<PeriodError> for SchedulerError {
    fn from(err: PeriodError) -> Self {
        SchedulerError::Period(err)
    }
}

impl From<ScheduleError> for SchedulerError {
    fn from(err: ScheduleError) -> Self {
        SchedulerError::Schedule(err)
    }
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        SchedulerError::Store(err)
    }
}

impl From<AdapterError> for SchedulerError {
    fn from(err: AdapterError) -> Self {
        SchedulerError::Adapter(err)
    }
}

impl From<DecisionError> for SchedulerError {
    fn from(err: DecisionError) -> Self {
        SchedulerError::Decision(err)
    }
}

impl From<ExecutorError> for SchedulerError {
    fn from(err: ExecutorError) -> Self {
        SchedulerError::Executor(err)
    }
}

impl From<CronError> for PeriodError {
    fn from(err: CronError) -> Self {
        PeriodError::UnknownCronField(err)
    }
}
