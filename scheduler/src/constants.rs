//! Application-wide constants for timeouts, limits, and configuration values
//!
//! This module organizes constants by category to improve maintainability
//! and provide a single source of truth for timeouts, intervals, and limits.

#![allow(dead_code)] // Some constants are defined for future use

use std::time::Duration;

/// Scheduling engine constants
pub mod scheduling {
    use super::Duration;

    /// Default scheduling interval when GlobalConfig doesn't specify one
    pub const DEFAULT_SCHEDULING_INTERVAL_MINUTES: u64 = 5;

    /// Safety margin subtracted from the scheduling interval to derive a worker's
    /// cancellation budget
    pub const WORKER_BUDGET_SAFETY_MARGIN: Duration = Duration::from_secs(10);

    /// Maintenance windows are treated as "running" starting this many minutes
    /// before their recorded next_execution_time
    pub const MAINTENANCE_WINDOW_EARLY_START_MINUTES: i64 = 10;

    /// Maximum ARNs/IDs per describe-style batch call to an adapter's cloud client
    pub const DESCRIBE_BATCH_SIZE: usize = 50;

    /// Maximum resources per informational-tagging batch call
    pub const TAGGING_BATCH_SIZE: usize = 20;

    /// Maximum events per event-bus batch put
    pub const EVENT_BATCH_SIZE: usize = 10;

    /// Informational tag values are truncated to this many characters
    pub const TAG_VALUE_MAX_LEN: usize = 256;

    /// Default max concurrent in-flight targets per orchestrator tick
    pub const DEFAULT_TARGET_CONCURRENCY: usize = 8;
}

/// Cleanup and maintenance constants
pub mod cleanup {
    /// Hours after which stuck operation-tracker entries are force-cleaned
    pub const OPERATION_CLEANUP_HOURS: i64 = 24;

    /// Cleanup sweep interval in seconds
    pub const CLEANUP_INTERVAL_SECONDS: u64 = 3600; // 1 hour
}

/// Alert system constants
pub mod alerts {
    /// Hours between repeated alerts for the same target once a failure persists
    pub const REPEAT_ALERT_INTERVAL_HOURS: i64 = 6;

    /// Webhook request timeout
    pub const WEBHOOK_TIMEOUT_SECONDS: u64 = 10;
}

/// Default configuration values
pub mod defaults {
    /// Default IANA timezone when a schedule or the global config omits one
    pub const DEFAULT_TIMEZONE: &str = "UTC";

    /// Default tag key carrying the schedule name on managed resources
    pub const DEFAULT_SCHEDULE_TAG_KEY: &str = "Schedule";
}
