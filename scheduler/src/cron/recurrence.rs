//! [`CronRecurrenceExpression`]: the three-field aggregate (months,
//! monthdays, weekdays) that a [`crate::period::Period`] carries.

use chrono::{DateTime, Datelike, TimeZone};

use super::{days_in_month, first_weekday_of_month, parser, validator, CronExpression, CronField};
use crate::errors::CronError;

/// Aggregates the three cron fields a period may constrain on. Each field
/// defaults to `All` (no constraint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronRecurrenceExpression {
    pub months: CronExpression,
    pub monthdays: CronExpression,
    pub weekdays: CronExpression,
}

impl Default for CronRecurrenceExpression {
    fn default() -> Self {
        Self {
            months: CronExpression::All,
            monthdays: CronExpression::All,
            weekdays: CronExpression::All,
        }
    }
}

impl CronRecurrenceExpression {
    /// Parse the three field strings (`None` defaults that field to `All`),
    /// validating each against its field-specific rules.
    pub fn parse(
        months: Option<&str>,
        monthdays: Option<&str>,
        weekdays: Option<&str>,
    ) -> Result<Self, CronError> {
        let months = parse_field_or_all(months, CronField::Months)?;
        let monthdays = parse_field_or_all(monthdays, CronField::Monthdays)?;
        let weekdays = parse_field_or_all(weekdays, CronField::Weekdays)?;
        Ok(Self {
            months,
            monthdays,
            weekdays,
        })
    }

    /// `true` iff `ts` satisfies all three fields.
    ///
    /// **Deliberate deviation from standard cron**: when both monthdays and
    /// weekdays are non-default, the intersection is required, not the
    /// union standard cron would compute. This is preserved for operator
    /// compatibility.
    pub fn contains<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> bool {
        let year = ts.year();
        let month = ts.month();
        let day = ts.day();
        let dim = days_in_month(year, month);
        let fwd = first_weekday_of_month(year, month);
        let weekday = ts.weekday().num_days_from_monday();

        self.months.contains_month(month)
            && self.monthdays.contains_monthday(day, fwd, dim)
            && self.weekdays.contains_weekday(weekday, day, fwd, dim)
    }
}

fn parse_field_or_all(value: Option<&str>, field: CronField) -> Result<CronExpression, CronError> {
    match value {
        None => Ok(CronExpression::All),
        Some(raw) if raw.trim().is_empty() => Ok(CronExpression::All),
        Some(raw) => {
            let expr = parser::parse_one(raw)?;
            validator::validate(&expr, field)?;
            Ok(expr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn defaults_match_everything() {
        let recurrence = CronRecurrenceExpression::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        assert!(recurrence.contains(&ts));
    }

    #[test]
    fn intersection_not_union_of_monthdays_and_weekdays() {
        // 2024-03-01 is a Friday (weekday index 4). Constrain monthdays to
        // day 1 and weekdays to Monday (0); the intersection has no day,
        // so March 1st must NOT match even though it satisfies monthdays.
        let recurrence =
            CronRecurrenceExpression::parse(None, Some("1"), Some("mon")).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(!recurrence.contains(&ts));

        // 2024-03-04 is a Monday and also matches weekdays=mon, but
        // monthdays=1 excludes it too (intersection again).
        let not_first = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        assert!(!recurrence.contains(&not_first));
    }

    #[test]
    fn nth_weekday_across_timezone_boundary() {
        // 2023-08-13T00:00:00+10:00 (Sydney) is Saturday 2023-08-12 14:00 UTC,
        // but the recurrence must be evaluated in the schedule's own
        // timezone, which is exactly what callers are expected to convert
        // to before calling `contains`.
        let recurrence = CronRecurrenceExpression::parse(None, None, Some("sun#2")).unwrap();
        let second_sunday = chrono_tz::Australia::Sydney
            .with_ymd_and_hms(2023, 8, 13, 0, 0, 0)
            .unwrap();
        assert!(recurrence.contains(&second_sunday));
    }
}
