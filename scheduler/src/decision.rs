//! Per-resource decision engine (C7): turns a schedule evaluation, the
//! resource's remembered state and its observed cloud state into exactly
//! one `Action`. Pure and synchronous — no I/O, no locking — so every
//! branch of §4.7's ten-step algorithm can be asserted directly in tests.

use chrono::{DateTime, Utc};

use crate::adapters::AbstractInstance;
use crate::period::PeriodState;
use crate::schedule::Schedule;
use crate::state::{ResourceStateRecord, StoredState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Hibernate,
    Resize(String),
    DoNothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingDecision {
    pub action: Action,
    pub reason: &'static str,
    pub new_stored_state: StoredState,
}

impl SchedulingDecision {
    fn do_nothing(reason: &'static str, new_stored_state: StoredState) -> Self {
        Self {
            action: Action::DoNothing,
            reason,
            new_stored_state,
        }
    }
}

/// Evaluate one resource against its schedule. `lookup_period` and
/// `active_maintenance_window` are forwarded to `Schedule::evaluate_with_adjacency`
/// (C3); see that function for the maintenance-window/override semantics.
pub fn decide<F>(
    schedule: &Schedule,
    ts: &DateTime<Utc>,
    lookup_period: F,
    active_maintenance_window: Option<&crate::maintenance_window::MaintenanceWindow>,
    instance: &AbstractInstance,
    stored: &ResourceStateRecord,
) -> SchedulingDecision
where
    F: Fn(&str) -> Option<crate::period::Period> + Copy,
{
    let evaluation = match schedule.evaluate_with_adjacency(ts, lookup_period, active_maintenance_window) {
        Ok(decision) => decision,
        Err(_) => return SchedulingDecision::do_nothing("schedule-evaluation-failed", stored.stored_state),
    };

    let desired = evaluation.state;
    let observed_running = instance.is_running();
    let observed_stopped = instance.is_stopped();

    // Step 4: detect a manual start while the engine still believes the
    // resource is stopped.
    if stored.stored_state == StoredState::Stopped && observed_running && schedule.retain_running {
        return SchedulingDecision::do_nothing("manual-start-detected", StoredState::RetainRunning);
    }

    // Step 5: the sticky RetainRunning mark rides out Stopped evaluations
    // until the schedule next asks for Running.
    if stored.stored_state == StoredState::RetainRunning && matches!(desired, PeriodState::Stopped) {
        return SchedulingDecision::do_nothing("retain-running-sticky", StoredState::RetainRunning);
    }

    // Step 6: a requested size change takes priority over start/stop,
    // provided the resource supports resizing.
    if let Some(size) = &evaluation.size {
        let needs_resize = instance.instance_type.as_deref() != Some(size.as_str());
        if needs_resize && instance.is_resizable {
            if observed_running {
                return SchedulingDecision {
                    action: Action::Stop,
                    reason: "resize-requires-stop",
                    new_stored_state: StoredState::Stopped,
                };
            } else if observed_stopped {
                return SchedulingDecision {
                    action: Action::Resize(size.clone()),
                    reason: "resize-then-start",
                    new_stored_state: StoredState::Running,
                };
            }
        }
    }

    match desired {
        PeriodState::Running => {
            if observed_stopped || (schedule.enforced && stored.stored_state == StoredState::Stopped) {
                let action = if schedule.hibernate && stored.stored_state == StoredState::StopFailed {
                    Action::Hibernate
                } else {
                    Action::Start
                };
                SchedulingDecision {
                    action,
                    reason: if schedule.enforced && observed_running {
                        "enforced-drift-repair"
                    } else {
                        "schedule-requests-running"
                    },
                    new_stored_state: StoredState::Running,
                }
            } else {
                SchedulingDecision::do_nothing("already-running", StoredState::Running)
            }
        }
        PeriodState::Stopped => {
            if observed_running {
                let action = if schedule.hibernate {
                    Action::Hibernate
                } else {
                    Action::Stop
                };
                SchedulingDecision {
                    action,
                    reason: "schedule-requests-stopped",
                    new_stored_state: StoredState::Stopped,
                }
            } else {
                SchedulingDecision::do_nothing("already-stopped", StoredState::Stopped)
            }
        }
        PeriodState::Any => {
            if stored.stored_state == StoredState::RetainRunning {
                SchedulingDecision::do_nothing("retain-running-outside-period", StoredState::RetainRunning)
            } else {
                SchedulingDecision::do_nothing("no-opinion", StoredState::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::schedule::{OverrideStatus, PeriodRef};
    use chrono::{NaiveTime, TimeZone};
    use std::collections::HashMap;

    fn business_hours_schedule() -> Schedule {
        Schedule {
            name: "business-hours".into(),
            timezone: "UTC".into(),
            periods: vec![PeriodRef {
                period_name: "office-hours".into(),
                instance_size: None,
            }],
            override_status: OverrideStatus::None,
            stop_new_instances: true,
            enforced: false,
            hibernate: false,
            retain_running: true,
            use_maintenance_window: false,
            ssm_maintenance_window: vec![],
            description: None,
            configured_in_stack: None,
        }
    }

    fn office_hours() -> Period {
        Period::running_window(
            "office-hours",
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )
    }

    fn lookup(name: &str) -> Option<Period> {
        if name == "office-hours" {
            Some(office_hours())
        } else {
            None
        }
    }

    fn instance(state: crate::adapters::InstanceState) -> AbstractInstance {
        AbstractInstance {
            id: "i-1".into(),
            name: None,
            schedule_name: Some("business-hours".into()),
            current_state: state,
            instance_type: Some("t3.micro".into()),
            tags: HashMap::new(),
            maintenance_windows: vec![],
            is_resizable: true,
        }
    }

    #[test]
    fn starts_stopped_instance_during_running_period() {
        let schedule = business_hours_schedule();
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 10, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Stopped),
            &ResourceStateRecord::unseen(),
        );
        assert_eq!(decision.action, Action::Start);
        assert_eq!(decision.new_stored_state, StoredState::Running);
    }

    #[test]
    fn stops_running_instance_outside_period() {
        let schedule = business_hours_schedule();
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 22, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::Running,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::Stop);
        assert_eq!(decision.new_stored_state, StoredState::Stopped);
    }

    #[test]
    fn manual_start_while_scheduled_stopped_sets_retain_running() {
        let schedule = business_hours_schedule();
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 22, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::Stopped,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::DoNothing);
        assert_eq!(decision.new_stored_state, StoredState::RetainRunning);
    }

    #[test]
    fn retain_running_sticky_survives_stopped_evaluation() {
        let schedule = business_hours_schedule();
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 22, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::RetainRunning,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::DoNothing);
        assert_eq!(decision.new_stored_state, StoredState::RetainRunning);
    }

    #[test]
    fn resize_requires_stop_before_resizing_a_running_instance() {
        let mut schedule = business_hours_schedule();
        schedule.periods[0].instance_size = Some("t3.large".into());
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 10, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::Running,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::Stop);
        assert_eq!(decision.reason, "resize-requires-stop");
    }

    #[test]
    fn resize_then_start_when_already_stopped() {
        let mut schedule = business_hours_schedule();
        schedule.periods[0].instance_size = Some("t3.large".into());
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 10, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup,
            None,
            &instance(crate::adapters::InstanceState::Stopped),
            &ResourceStateRecord::unseen(),
        );
        assert_eq!(decision.action, Action::Resize("t3.large".into()));
    }

    #[test]
    fn enforced_one_sided_start_period_does_not_stop_before_begin() {
        let schedule = Schedule {
            periods: vec![PeriodRef {
                period_name: "after-9".into(),
                instance_size: None,
            }],
            enforced: true,
            ..business_hours_schedule()
        };
        let lookup_one_sided = |name: &str| -> Option<Period> {
            if name == "after-9" {
                Some(Period::running_window_open_ended(
                    "after-9",
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                ))
            } else {
                None
            }
        };
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 5, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            lookup_one_sided,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::RetainRunning,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::DoNothing);
    }

    #[test]
    fn unknown_period_evaluation_failure_preserves_stored_state() {
        let schedule = business_hours_schedule();
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 10, 0, 0).unwrap();
        let decision = decide(
            &schedule,
            &ts,
            |_| None,
            None,
            &instance(crate::adapters::InstanceState::Running),
            &ResourceStateRecord {
                stored_state: StoredState::Running,
                ..ResourceStateRecord::unseen()
            },
        );
        assert_eq!(decision.action, Action::DoNothing);
        assert_eq!(decision.new_stored_state, StoredState::Running);
    }
}
