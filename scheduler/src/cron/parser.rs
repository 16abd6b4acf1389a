//! Field-agnostic cron token parser.
//!
//! The parser has no knowledge of which field (months, monthdays, weekdays)
//! it is parsing for; [`super::validator`] enforces field-specific rules
//! afterward. Hand-rolled string parsing rather than a grammar/regex crate.

use super::{CronExpression, RangeBound};
use crate::errors::CronError;

/// Parse a set of field-value strings into a single expression. Each string
/// may itself contain `,`-separated tokens; the result is the `Union` of
/// every token across every input string.
pub fn parse_field(values: &[String]) -> Result<CronExpression, CronError> {
    let mut exprs = Vec::new();
    for value in values {
        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            exprs.push(parse_token(token)?);
        }
    }

    match exprs.len() {
        0 => Err(CronError::EmptyExpression),
        1 => Ok(exprs.into_iter().next().expect("length checked above")),
        _ => Ok(CronExpression::Union(exprs)),
    }
}

/// Parse a single field-value string (may contain commas) on its own.
pub fn parse_one(value: &str) -> Result<CronExpression, CronError> {
    parse_field(std::slice::from_ref(&value.to_string()))
}

fn parse_token(token: &str) -> Result<CronExpression, CronError> {
    if token == "*" || token == "?" {
        return Ok(CronExpression::All);
    }
    if token.eq_ignore_ascii_case("L") {
        return Ok(CronExpression::SingleLast);
    }
    if let Some((day_part, n_part)) = token.split_once('#') {
        let day = parse_value(day_part)?;
        let n: u32 = n_part
            .parse()
            .map_err(|_| CronError::InvalidToken(token.to_string()))?;
        return Ok(CronExpression::NthWeekday { day, n });
    }
    if let Some(prefix) = strip_suffix_ci(token, "L") {
        if !prefix.is_empty() {
            if let Ok(day) = parse_value(prefix) {
                return Ok(CronExpression::LastWeekday(day));
            }
        }
    }
    if let Some(prefix) = strip_suffix_ci(token, "W") {
        if let Ok(n) = prefix.parse::<u32>() {
            return Ok(CronExpression::NearestWeekday(n));
        }
    }
    if let Some((range_part, step_part)) = token.split_once('/') {
        let interval: u32 = step_part
            .parse()
            .map_err(|_| CronError::InvalidToken(token.to_string()))?;
        if interval == 0 {
            return Err(CronError::InvalidInterval);
        }
        return if let Some((a, b)) = range_part.split_once('-') {
            let start = parse_value(a)?;
            let end = Some(parse_range_end(b)?);
            Ok(CronExpression::Range {
                start,
                end,
                interval,
            })
        } else {
            let start = parse_value(range_part)?;
            Ok(CronExpression::Range {
                start,
                end: None,
                interval,
            })
        };
    }
    if let Some((a, b)) = token.split_once('-') {
        let start = parse_value(a)?;
        let end = Some(parse_range_end(b)?);
        return Ok(CronExpression::Range {
            start,
            end,
            interval: 1,
        });
    }

    let n = parse_value(token)?;
    Ok(CronExpression::SingleNumeric(n))
}

fn strip_suffix_ci<'a>(token: &'a str, suffix: &str) -> Option<&'a str> {
    if token.len() > suffix.len() && token[token.len() - suffix.len()..].eq_ignore_ascii_case(suffix) {
        Some(&token[..token.len() - suffix.len()])
    } else {
        None
    }
}

fn parse_range_end(raw: &str) -> Result<RangeBound, CronError> {
    if raw.eq_ignore_ascii_case("L") {
        Ok(RangeBound::Last)
    } else {
        Ok(RangeBound::Numeric(parse_value(raw)?))
    }
}

fn parse_value(raw: &str) -> Result<u32, CronError> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    name_to_index(raw).ok_or_else(|| CronError::InvalidToken(raw.to_string()))
}

/// Month names map to 1-12, weekday names map to 0-6 (Monday=0). The two
/// tables don't collide on any string so a single lookup works regardless
/// of which field the caller intends.
fn name_to_index(name: &str) -> Option<u32> {
    const TABLE: &[(&str, u32)] = &[
        ("jan", 1),
        ("january", 1),
        ("feb", 2),
        ("february", 2),
        ("mar", 3),
        ("march", 3),
        ("apr", 4),
        ("april", 4),
        ("may", 5),
        ("jun", 6),
        ("june", 6),
        ("jul", 7),
        ("july", 7),
        ("aug", 8),
        ("august", 8),
        ("sep", 9),
        ("september", 9),
        ("oct", 10),
        ("october", 10),
        ("nov", 11),
        ("november", 11),
        ("dec", 12),
        ("december", 12),
        ("mon", 0),
        ("monday", 0),
        ("tue", 1),
        ("tuesday", 1),
        ("wed", 2),
        ("wednesday", 2),
        ("thu", 3),
        ("thursday", 3),
        ("fri", 4),
        ("friday", 4),
        ("sat", 5),
        ("saturday", 5),
        ("sun", 6),
        ("sunday", 6),
    ];
    let lower = name.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(candidate, _)| *candidate == lower)
        .map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard() {
        assert_eq!(parse_one("*").unwrap(), CronExpression::All);
        assert_eq!(parse_one("?").unwrap(), CronExpression::All);
    }

    #[test]
    fn parses_last() {
        assert_eq!(parse_one("L").unwrap(), CronExpression::SingleLast);
    }

    #[test]
    fn parses_numeric_and_names() {
        assert_eq!(parse_one("5").unwrap(), CronExpression::SingleNumeric(5));
        assert_eq!(parse_one("Jan").unwrap(), CronExpression::SingleNumeric(1));
        assert_eq!(parse_one("mon").unwrap(), CronExpression::SingleNumeric(0));
        assert_eq!(parse_one("SUN").unwrap(), CronExpression::SingleNumeric(6));
    }

    #[test]
    fn parses_ranges_and_steps() {
        assert_eq!(
            parse_one("1-5").unwrap(),
            CronExpression::Range {
                start: 1,
                end: Some(RangeBound::Numeric(5)),
                interval: 1
            }
        );
        assert_eq!(
            parse_one("1/7").unwrap(),
            CronExpression::Range {
                start: 1,
                end: None,
                interval: 7
            }
        );
        assert_eq!(
            parse_one("15-30/3").unwrap(),
            CronExpression::Range {
                start: 15,
                end: Some(RangeBound::Numeric(30)),
                interval: 3
            }
        );
        assert_eq!(
            parse_one("6-L").unwrap(),
            CronExpression::Range {
                start: 6,
                end: Some(RangeBound::Last),
                interval: 1
            }
        );
        assert_eq!(
            parse_one("3-L/2").unwrap(),
            CronExpression::Range {
                start: 3,
                end: Some(RangeBound::Last),
                interval: 2
            }
        );
    }

    #[test]
    fn parses_nearest_nth_last_weekday() {
        assert_eq!(parse_one("17W").unwrap(), CronExpression::NearestWeekday(17));
        assert_eq!(
            parse_one("sun#2").unwrap(),
            CronExpression::NthWeekday { day: 6, n: 2 }
        );
        assert_eq!(parse_one("friL").unwrap(), CronExpression::LastWeekday(4));
    }

    #[test]
    fn parses_union_across_multiple_strings() {
        let values = vec!["1,2".to_string(), "3".to_string()];
        assert_eq!(
            parse_field(&values).unwrap(),
            CronExpression::Union(vec![
                CronExpression::SingleNumeric(1),
                CronExpression::SingleNumeric(2),
                CronExpression::SingleNumeric(3),
            ])
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_one("W").is_err());
        assert!(parse_one("2W-15").is_err());
    }
}
