//! Period evaluator (C2): decides whether a timestamp satisfies a period's
//! recurrence and falls within its begin/end time-of-day window.

use chrono::{DateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::cron::CronRecurrenceExpression;
use crate::errors::PeriodError;

/// The three-valued result of evaluating a period at a timestamp. `Any` is
/// the identity element: "this period has no opinion", letting a schedule
/// fold several periods together without special-casing absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodState {
    Running,
    Stopped,
    Any,
}

/// A named recurrence plus an optional begin/end time-of-day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub name: String,
    pub description: Option<String>,
    /// "HH:MM", 24h
    pub begintime: Option<String>,
    /// "HH:MM", 24h
    pub endtime: Option<String>,
    pub months: Option<String>,
    pub monthdays: Option<String>,
    pub weekdays: Option<String>,
    pub configured_in_stack: Option<bool>,
}

impl Period {
    /// Construct an always-running period ("neither begin nor end, no
    /// calendar constraint") — used to synthesize ephemeral maintenance
    /// windows (§4.10), which have no name-level identity of their own
    /// beyond the one the caller assigns.
    pub fn always_running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            begintime: None,
            endtime: None,
            months: None,
            monthdays: None,
            weekdays: None,
            configured_in_stack: Some(false),
        }
    }

    /// Construct a one-sided-start period covering `[begin, end)` in UTC
    /// clock time only (date constraints are not expressible this way; this
    /// is only used for the maintenance-window synthesis in §4.10, which
    /// operates on a single calendar day by construction of the caller).
    pub fn running_window(name: impl Into<String>, begin: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            description: None,
            begintime: Some(begin.format("%H:%M").to_string()),
            endtime: Some(end.format("%H:%M").to_string()),
            months: None,
            monthdays: None,
            weekdays: None,
            configured_in_stack: Some(false),
        }
    }

    /// Construct a one-sided-start period with no end: Running from
    /// `begin` onward, `Any` (not Stopped) before it.
    pub fn running_window_open_ended(name: impl Into<String>, begin: NaiveTime) -> Self {
        Self {
            name: name.into(),
            description: None,
            begintime: Some(begin.format("%H:%M").to_string()),
            endtime: None,
            months: None,
            monthdays: None,
            weekdays: None,
            configured_in_stack: Some(false),
        }
    }

    pub fn recurrence(&self) -> Result<CronRecurrenceExpression, PeriodError> {
        CronRecurrenceExpression::parse(
            self.months.as_deref(),
            self.monthdays.as_deref(),
            self.weekdays.as_deref(),
        )
        .map_err(PeriodError::from)
    }

    fn begin(&self) -> Result<Option<NaiveTime>, PeriodError> {
        self.begintime.as_deref().map(|s| self.parse_time(s)).transpose()
    }

    fn end(&self) -> Result<Option<NaiveTime>, PeriodError> {
        self.endtime.as_deref().map(|s| self.parse_time(s)).transpose()
    }

    fn parse_time(&self, value: &str) -> Result<NaiveTime, PeriodError> {
        NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| PeriodError::InvalidTime {
            name: self.name.clone(),
            value: value.to_string(),
        })
    }

    /// At least one constraint (time-of-day or calendar) must be non-default,
    /// and if both times are set, begin must be strictly before end.
    pub fn validate(&self) -> Result<(), PeriodError> {
        let begin = self.begin()?;
        let end = self.end()?;
        let has_calendar = self.months.is_some() || self.monthdays.is_some() || self.weekdays.is_some();

        if begin.is_none() && end.is_none() && !has_calendar {
            return Err(PeriodError::NoConstraints {
                name: self.name.clone(),
            });
        }

        if let (Some(b), Some(e)) = (begin, end) {
            if b >= e {
                return Err(PeriodError::BeginNotBeforeEnd {
                    name: self.name.clone(),
                    begin: b.format("%H:%M").to_string(),
                    end: e.format("%H:%M").to_string(),
                });
            }
        }

        // Parsing the recurrence surfaces any field-specific validation
        // failures (out-of-range values, disallowed variants per field).
        self.recurrence()?;
        Ok(())
    }

    /// `desired_state(period, ts)` per §4.2.
    pub fn desired_state<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> Result<PeriodState, PeriodError> {
        let recurrence = self.recurrence()?;
        if !recurrence.contains(ts) {
            return Ok(PeriodState::Any);
        }

        let t = ts.time();
        Ok(match (self.begin()?, self.end()?) {
            (Some(begin), Some(end)) => {
                if t >= begin && t < end {
                    PeriodState::Running
                } else {
                    PeriodState::Stopped
                }
            }
            (Some(begin), None) => {
                if t >= begin {
                    PeriodState::Running
                } else {
                    PeriodState::Any
                }
            }
            (None, Some(end)) => {
                if t >= end {
                    PeriodState::Stopped
                } else {
                    PeriodState::Any
                }
            }
            (None, None) => PeriodState::Running,
        })
    }
}
