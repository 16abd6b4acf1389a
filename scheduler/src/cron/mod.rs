//! Cron expression model (C1): a tagged expression tree shared by the months,
//! monthdays and weekdays fields, with field-specific validation and
//! containment semantics.
//!
//! Weekday numbering is `0 = Monday` throughout, preserved for operator
//! compatibility with the dialect this was distilled from.

pub mod parser;
pub mod recurrence;
pub mod validator;

pub use recurrence::CronRecurrenceExpression;
pub use validator::CronField;

/// A single field's parsed value: a sum type dispatched by variant rather
/// than by inheritance, so containment checks stay total and exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronExpression {
    /// `*` / `?`: matches everything
    All,
    /// A bare integer or month/weekday name
    SingleNumeric(u32),
    /// `L`: the last value of the field (last day of month)
    SingleLast,
    /// `A-B`, `A/k`, `A-B/k`
    Range {
        start: u32,
        end: Option<RangeBound>,
        interval: u32,
    },
    /// Comma-separated union of the above
    Union(Vec<CronExpression>),
    /// `nW`: nearest weekday to day `n` (monthdays only)
    NearestWeekday(u32),
    /// `D#n`: the n-th occurrence of weekday `D` in the month (weekdays only)
    NthWeekday { day: u32, n: u32 },
    /// `DL`: the last occurrence of weekday `D` in the month (weekdays only)
    LastWeekday(u32),
}

/// The upper bound of a `Range`, which may be a literal number or the
/// dynamic "last value of the field" (last day of month for monthdays).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Numeric(u32),
    Last,
}

fn days_in_month(year: i32, month: u32) -> u32 {
    use chrono::NaiveDate;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("month is already validated to be 1-12");
    let first_of_this = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    (first_of_next - first_of_this).num_days() as u32
}

/// 0=Monday index of the weekday of the first day of the month.
fn first_weekday_of_month(year: i32, month: u32) -> u32 {
    use chrono::{Datelike, NaiveDate};
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("valid month")
        .weekday()
        .num_days_from_monday()
}

/// Clamp day `n` to the nearest weekday, shifting off a Saturday/Sunday.
/// Edge-of-month clamping: a shift that would leave the month reverses
/// direction instead.
fn nearest_weekday(n: u32, first_weekday: u32, days_in_month: u32) -> u32 {
    let weekday = ((n as i64 % 7) + first_weekday as i64 - 1).rem_euclid(7) as u32;
    match weekday {
        5 => {
            // Saturday: shift back a day, or forward two if day 1 is a Saturday
            if n == 1 {
                n + 2
            } else {
                n - 1
            }
        }
        6 => {
            // Sunday: shift forward a day, or back two if the last day is a Sunday
            if n == days_in_month {
                n - 2
            } else {
                n + 1
            }
        }
        _ => n,
    }
}

/// Day-of-month of the first occurrence of `weekday` (0=Monday) in the month.
fn first_occurrence_of_weekday(weekday: u32, first_weekday: u32) -> u32 {
    1 + (weekday as i64 - first_weekday as i64).rem_euclid(7) as u32
}

/// Day-of-month of the n-th occurrence of `weekday`, or `None` if the month
/// doesn't have that many (e.g. a 5th Monday in a 4-Monday month).
fn nth_occurrence_of_weekday(
    weekday: u32,
    n: u32,
    first_weekday: u32,
    days_in_month: u32,
) -> Option<u32> {
    let day = first_occurrence_of_weekday(weekday, first_weekday) + (n - 1) * 7;
    if day <= days_in_month {
        Some(day)
    } else {
        None
    }
}

/// Day-of-month of the last occurrence of `weekday` in the month.
fn last_occurrence_of_weekday(weekday: u32, first_weekday: u32, days_in_month: u32) -> u32 {
    let mut day = first_occurrence_of_weekday(weekday, first_weekday);
    while day + 7 <= days_in_month {
        day += 7;
    }
    day
}

impl CronExpression {
    pub fn contains_month(&self, month: u32) -> bool {
        match self {
            CronExpression::All => true,
            CronExpression::SingleNumeric(n) => *n == month,
            CronExpression::Range {
                start,
                end,
                interval,
            } => in_range(month, *start, end_bound(end, 12), *interval),
            CronExpression::Union(exprs) => exprs.iter().any(|e| e.contains_month(month)),
            // SingleLast/NearestWeekday/NthWeekday/LastWeekday are rejected
            // for this field by the validator; defensively total here rather
            // than reachable in practice.
            _ => false,
        }
    }

    pub fn contains_monthday(&self, day: u32, first_weekday: u32, days_in_month: u32) -> bool {
        match self {
            CronExpression::All => true,
            CronExpression::SingleNumeric(n) => *n == day,
            CronExpression::SingleLast => day == days_in_month,
            CronExpression::Range {
                start,
                end,
                interval,
            } => in_range(day, *start, end_bound(end, days_in_month), *interval),
            CronExpression::Union(exprs) => exprs
                .iter()
                .any(|e| e.contains_monthday(day, first_weekday, days_in_month)),
            CronExpression::NearestWeekday(n) => {
                nearest_weekday(*n, first_weekday, days_in_month) == day
            }
            CronExpression::NthWeekday { .. } | CronExpression::LastWeekday(_) => false,
        }
    }

    pub fn contains_weekday(
        &self,
        weekday: u32,
        day: u32,
        first_weekday: u32,
        days_in_month: u32,
    ) -> bool {
        match self {
            CronExpression::All => true,
            CronExpression::SingleNumeric(n) => *n == weekday,
            CronExpression::Range {
                start,
                end,
                interval,
            } => in_range(weekday, *start, end_bound(end, 6), *interval),
            CronExpression::Union(exprs) => exprs
                .iter()
                .any(|e| e.contains_weekday(weekday, day, first_weekday, days_in_month)),
            CronExpression::NthWeekday { day: d, n } => {
                weekday == *d
                    && nth_occurrence_of_weekday(*d, *n, first_weekday, days_in_month) == Some(day)
            }
            CronExpression::LastWeekday(d) => {
                weekday == *d && last_occurrence_of_weekday(*d, first_weekday, days_in_month) == day
            }
            CronExpression::SingleLast | CronExpression::NearestWeekday(_) => false,
        }
    }
}

fn end_bound(end: &Option<RangeBound>, field_max: u32) -> u32 {
    match end {
        Some(RangeBound::Numeric(e)) => *e,
        Some(RangeBound::Last) | None => field_max,
    }
}

fn in_range(value: u32, start: u32, end: u32, interval: u32) -> bool {
    value >= start && value <= end && (value - start) % interval.max(1) == 0
}
