//! Schedule evaluator (C3): folds a schedule's periods into a single
//! Running/Stopped decision for a timestamp, with an adjacency check to
//! avoid spurious stops at back-to-back period boundaries.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::ScheduleError;
use crate::maintenance_window::MaintenanceWindow;
use crate::period::{Period, PeriodState};

/// An operator-forced override that bypasses period evaluation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideStatus {
    Running,
    Stopped,
    None,
}

impl Default for OverrideStatus {
    fn default() -> Self {
        OverrideStatus::None
    }
}

/// A period reference within a schedule, optionally pinning an instance
/// size while that period is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRef {
    pub period_name: String,
    pub instance_size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub timezone: String,
    pub periods: Vec<PeriodRef>,
    #[serde(default)]
    pub override_status: OverrideStatus,
    #[serde(default = "default_true")]
    pub stop_new_instances: bool,
    #[serde(default)]
    pub enforced: bool,
    #[serde(default)]
    pub hibernate: bool,
    #[serde(default)]
    pub retain_running: bool,
    #[serde(default)]
    pub use_maintenance_window: bool,
    #[serde(default)]
    pub ssm_maintenance_window: Vec<String>,
    pub description: Option<String>,
    pub configured_in_stack: Option<bool>,
}

fn default_true() -> bool {
    true
}

/// The result of folding every period in a schedule together at one
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub state: PeriodState,
    pub size: Option<String>,
    pub active_period: Option<String>,
}

impl Schedule {
    pub fn validate(&self, known_period_names: &[String]) -> Result<(), ScheduleError> {
        let has_override = self.override_status != OverrideStatus::None;
        if has_override && !self.periods.is_empty() {
            return Err(ScheduleError::OverrideAndPeriodsConflict {
                schedule: self.name.clone(),
            });
        }
        if !has_override && self.periods.is_empty() {
            return Err(ScheduleError::NoPeriodsOrOverride {
                schedule: self.name.clone(),
            });
        }
        for period_ref in &self.periods {
            if !known_period_names.contains(&period_ref.period_name) {
                return Err(ScheduleError::UnknownPeriod {
                    schedule: self.name.clone(),
                    period: period_ref.period_name.clone(),
                });
            }
        }
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ScheduleError::UnknownTimezone {
                schedule: self.name.clone(),
                timezone: self.timezone.clone(),
            })?;
        Ok(())
    }

    fn tz(&self) -> Result<Tz, ScheduleError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ScheduleError::UnknownTimezone {
                schedule: self.name.clone(),
                timezone: self.timezone.clone(),
            })
    }

    /// Resolve each `PeriodRef` against a lookup function, returning the
    /// owned `Period` alongside its configured size. Callers (the decision
    /// engine) own the actual period store lookup; this keeps `Schedule`
    /// itself free of a store dependency.
    fn resolve_periods<'a, F>(&'a self, lookup: F) -> Result<Vec<(&'a PeriodRef, Period)>, ScheduleError>
    where
        F: Fn(&str) -> Option<Period>,
    {
        self.periods
            .iter()
            .map(|period_ref| {
                lookup(&period_ref.period_name)
                    .map(|period| (period_ref, period))
                    .ok_or_else(|| ScheduleError::UnknownPeriod {
                        schedule: self.name.clone(),
                        period: period_ref.period_name.clone(),
                    })
            })
            .collect()
    }

    /// §4.3: fold every period's `desired_state` at `ts`, honoring
    /// `override_status` and an active maintenance window.
    pub fn evaluate<F>(
        &self,
        ts: &DateTime<Utc>,
        lookup_period: F,
        active_maintenance_window: Option<&MaintenanceWindow>,
    ) -> Result<ScheduleDecision, ScheduleError>
    where
        F: Fn(&str) -> Option<Period>,
    {
        if self.override_status != OverrideStatus::None {
            let state = match self.override_status {
                OverrideStatus::Running => PeriodState::Running,
                OverrideStatus::Stopped => PeriodState::Stopped,
                OverrideStatus::None => unreachable!("checked above"),
            };
            return Ok(ScheduleDecision {
                state,
                size: None,
                active_period: None,
            });
        }

        let tz = self.tz()?;
        let local_ts = ts.with_timezone(&tz);

        if self.use_maintenance_window {
            if let Some(window) = active_maintenance_window {
                if window.is_running(ts) {
                    return Ok(ScheduleDecision {
                        state: PeriodState::Running,
                        size: None,
                        active_period: Some(window.window_name.clone()),
                    });
                }
            }
        }

        let resolved = self.resolve_periods(lookup_period)?;
        self.fold(&resolved, &local_ts)
    }

    fn fold(
        &self,
        resolved: &[(&PeriodRef, Period)],
        local_ts: &DateTime<Tz>,
    ) -> Result<ScheduleDecision, ScheduleError> {
        let mut any_stopped = false;
        for (period_ref, period) in resolved {
            let state = period
                .desired_state(local_ts)
                .map_err(|_| ScheduleError::UnknownPeriod {
                    schedule: self.name.clone(),
                    period: period_ref.period_name.clone(),
                })?;
            match state {
                PeriodState::Running => {
                    return Ok(ScheduleDecision {
                        state: PeriodState::Running,
                        size: period_ref.instance_size.clone(),
                        active_period: Some(period_ref.period_name.clone()),
                    });
                }
                PeriodState::Stopped => any_stopped = true,
                PeriodState::Any => {}
            }
        }

        Ok(ScheduleDecision {
            state: if any_stopped {
                PeriodState::Stopped
            } else {
                PeriodState::Any
            },
            size: None,
            active_period: None,
        })
    }

    /// §4.3 adjacency check: if `ts` evaluates to Stopped (or Any) but one
    /// minute earlier it was Running, recheck a minute on either side of
    /// `ts`; if any recheck says Running, treat `ts` as Running too. This
    /// prevents a dispatch tick landing exactly on a period boundary from
    /// stopping an instance that is really just handing off between two
    /// back-to-back periods.
    pub fn evaluate_with_adjacency<F>(
        &self,
        ts: &DateTime<Utc>,
        lookup_period: F,
        active_maintenance_window: Option<&MaintenanceWindow>,
    ) -> Result<ScheduleDecision, ScheduleError>
    where
        F: Fn(&str) -> Option<Period> + Copy,
    {
        let current = self.evaluate(ts, lookup_period, active_maintenance_window)?;
        if current.state == PeriodState::Running {
            return Ok(current);
        }

        let one_minute_ago = *ts - Duration::minutes(1);
        let was_running = self
            .evaluate(&one_minute_ago, lookup_period, active_maintenance_window)?
            .state
            == PeriodState::Running;
        if !was_running {
            return Ok(current);
        }

        for offset in [Duration::minutes(1), Duration::minutes(-1)] {
            let probe = *ts + offset;
            let probed = self.evaluate(&probe, lookup_period, active_maintenance_window)?;
            if probed.state == PeriodState::Running {
                return Ok(probed);
            }
        }

        Ok(current)
    }
}
