//! Field-specific validation of a parsed [`super::CronExpression`].

use super::{CronExpression, RangeBound};
use crate::errors::CronError;

/// Which field an expression is being validated for. The parser produces
/// the same tree regardless of field; only the validator knows the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Months,
    Monthdays,
    Weekdays,
}

impl CronField {
    fn name(self) -> &'static str {
        match self {
            CronField::Months => "months",
            CronField::Monthdays => "monthdays",
            CronField::Weekdays => "weekdays",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            CronField::Months => (1, 12),
            CronField::Monthdays => (1, 31),
            CronField::Weekdays => (0, 6),
        }
    }
}

pub fn validate(expr: &CronExpression, field: CronField) -> Result<(), CronError> {
    match expr {
        CronExpression::All => Ok(()),
        CronExpression::Union(exprs) => exprs.iter().try_for_each(|e| validate(e, field)),
        CronExpression::SingleLast => {
            if field == CronField::Months {
                Err(CronError::DisallowedInField {
                    token: "L".to_string(),
                    field: field.name(),
                })
            } else {
                Ok(())
            }
        }
        CronExpression::SingleNumeric(n) => validate_bounds(*n, field),
        CronExpression::Range {
            start,
            end,
            interval,
        } => {
            validate_bounds(*start, field)?;
            if let Some(RangeBound::Numeric(end)) = end {
                validate_bounds(*end, field)?;
                if field == CronField::Monthdays && start > end {
                    return Err(CronError::InvalidRange {
                        start: *start,
                        end: *end,
                    });
                }
            }
            if *interval == 0 {
                return Err(CronError::InvalidInterval);
            }
            Ok(())
        }
        CronExpression::NearestWeekday(n) => {
            if field != CronField::Monthdays {
                return Err(CronError::DisallowedInField {
                    token: format!("{}W", n),
                    field: field.name(),
                });
            }
            validate_bounds(*n, CronField::Monthdays)
        }
        CronExpression::NthWeekday { day, n } => {
            if field != CronField::Weekdays {
                return Err(CronError::DisallowedInField {
                    token: format!("{}#{}", day, n),
                    field: field.name(),
                });
            }
            if !(1..=5).contains(n) {
                return Err(CronError::InvalidOccurrence(*n));
            }
            validate_bounds(*day, CronField::Weekdays)
        }
        CronExpression::LastWeekday(day) => {
            if field != CronField::Weekdays {
                return Err(CronError::DisallowedInField {
                    token: format!("{}L", day),
                    field: field.name(),
                });
            }
            validate_bounds(*day, CronField::Weekdays)
        }
    }
}

fn validate_bounds(n: u32, field: CronField) -> Result<(), CronError> {
    let (min, max) = field.bounds();
    if n < min || n > max {
        Err(CronError::OutOfRange {
            value: n,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::parser::parse_one;
    use rstest::rstest;

    #[rstest]
    #[case("13", CronField::Months, false)]
    #[case("12", CronField::Months, true)]
    #[case("L", CronField::Months, false)]
    #[case("32", CronField::Monthdays, false)]
    #[case("17W", CronField::Monthdays, true)]
    #[case("17W", CronField::Months, false)]
    #[case("mon#6", CronField::Weekdays, false)]
    #[case("mon#2", CronField::Weekdays, true)]
    #[case("mon#2", CronField::Monthdays, false)]
    #[case("friL", CronField::Weekdays, true)]
    #[case("friL", CronField::Months, false)]
    #[case("L-13", CronField::Monthdays, false)]
    #[case("32-40", CronField::Monthdays, false)]
    fn validates_field_rules(#[case] token: &str, #[case] field: CronField, #[case] ok: bool) {
        // "L" is only meaningful as a range end (e.g. "6-L"); as a bare
        // token it is never a valid start, so parsing itself fails.
        let result = parse_one(token).and_then(|expr| validate(&expr, field));
        assert_eq!(result.is_ok(), ok, "token={token}");
    }

    #[test]
    fn rejects_backwards_monthday_range() {
        let expr = parse_one("20-10").unwrap();
        assert!(validate(&expr, CronField::Monthdays).is_err());
    }
}
