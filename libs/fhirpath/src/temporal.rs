//! Parsing of date, time and dateTime literal bodies.
//!
//! Used both for `@...` literals and for string → temporal conversions.
//! All parsers record the precision actually written.

use chrono::{NaiveDate, NaiveTime};

use crate::value::{Date, DatePrecision, DateTime, DateTimePrecision, Time, TimePrecision};

pub(crate) fn parse_date(input: &str) -> Option<Date> {
    let s = input.trim();
    match s.len() {
        4 => {
            let year: i32 = digits(s)?.parse().ok()?;
            Some(Date {
                date: NaiveDate::from_ymd_opt(year, 1, 1)?,
                precision: DatePrecision::Year,
            })
        }
        7 => {
            let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()?;
            Some(Date {
                date,
                precision: DatePrecision::Month,
            })
        }
        10 => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            Some(Date {
                date,
                precision: DatePrecision::Day,
            })
        }
        _ => None,
    }
}

pub(crate) fn parse_time(input: &str) -> Option<Time> {
    let s = input.trim().strip_prefix('T').unwrap_or(input.trim());
    let (time, precision) = parse_time_parts(s)?;
    Some(Time { time, precision })
}

/// Parse a dateTime body: date, optional `T` + time, optional zone.
/// A bare date yields a dateTime at the date's precision.
pub(crate) fn parse_datetime(input: &str) -> Option<DateTime> {
    let raw = input.trim();
    let Some((date_part, rest)) = raw.split_once('T') else {
        let date = parse_date(raw)?;
        return Some(DateTime {
            date: date.date,
            time: NaiveTime::from_hms_opt(0, 0, 0)?,
            precision: date.precision.into(),
            offset: None,
        });
    };

    let date = parse_date(date_part)?;
    if date.precision != DatePrecision::Day {
        return None;
    }
    let (time_part, offset) = split_offset(rest)?;
    if time_part.is_empty() {
        return Some(DateTime {
            date: date.date,
            time: NaiveTime::from_hms_opt(0, 0, 0)?,
            precision: DateTimePrecision::Day,
            offset,
        });
    }
    let (time, time_precision) = parse_time_parts(time_part)?;
    Some(DateTime {
        date: date.date,
        time,
        precision: time_precision.into(),
        offset,
    })
}

/// Split a trailing zone designator (`Z`, `±hh:mm`, `±hhmm`) off a time body.
pub(crate) fn split_offset(rest: &str) -> Option<(&str, Option<i32>)> {
    if let Some(stripped) = rest.strip_suffix('Z') {
        return Some((stripped, Some(0)));
    }
    if let Some(pos) = rest.rfind(['+', '-']) {
        let (time, zone) = rest.split_at(pos);
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        let body = &zone[1..];
        let (hours, minutes) = match (body.len(), body.find(':')) {
            (5, Some(2)) => (body[..2].parse::<i32>().ok()?, body[3..].parse::<i32>().ok()?),
            (4, None) => (body[..2].parse::<i32>().ok()?, body[2..].parse::<i32>().ok()?),
            _ => return None,
        };
        if hours > 14 || minutes > 59 {
            return None;
        }
        return Some((time, Some(sign * (hours * 3600 + minutes * 60))));
    }
    Some((rest, None))
}

fn parse_time_parts(s: &str) -> Option<(NaiveTime, TimePrecision)> {
    let (main, frac) = match s.split_once('.') {
        Some((main, frac)) => (main, Some(frac)),
        None => (s, None),
    };

    let parts: Vec<&str> = main.split(':').collect();
    let (h, m, sec, precision) = match parts.as_slice() {
        [h] => (h, "0", "0", TimePrecision::Hour),
        [h, m] => (h, *m, "0", TimePrecision::Minute),
        [h, m, s] => (
            h,
            *m,
            *s,
            if frac.is_some() {
                TimePrecision::Millisecond
            } else {
                TimePrecision::Second
            },
        ),
        _ => return None,
    };

    let hour: u32 = digits(h)?.parse().ok()?;
    let minute: u32 = digits(m)?.parse().ok()?;
    let second: u32 = digits(sec)?.parse().ok()?;
    let millis: u32 = match frac {
        Some(frac) => {
            let trimmed: String = frac.chars().take(3).collect();
            if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            format!("{trimmed:0<3}").parse().ok()?
        }
        None => 0,
    };

    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    Some((time, precision))
}

fn digits(s: &str) -> Option<&str> {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        Some(s)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_precisions() {
        assert_eq!(parse_date("2024").unwrap().precision, DatePrecision::Year);
        assert_eq!(
            parse_date("2024-12").unwrap().precision,
            DatePrecision::Month
        );
        assert_eq!(
            parse_date("2024-12-25").unwrap().precision,
            DatePrecision::Day
        );
        assert!(parse_date("2024-13-01").is_none());
        assert!(parse_date("24-12-25").is_none());
    }

    #[test]
    fn datetime_with_offset() {
        let dt = parse_datetime("2015-02-04T14:34:28+09:00").unwrap();
        assert_eq!(dt.precision, DateTimePrecision::Second);
        assert_eq!(dt.offset, Some(9 * 3600));

        let dt = parse_datetime("2015-02-04T14:34:28.123Z").unwrap();
        assert_eq!(dt.precision, DateTimePrecision::Millisecond);
        assert_eq!(dt.offset, Some(0));
    }

    #[test]
    fn bare_date_is_datetime_at_date_precision() {
        let dt = parse_datetime("2015-02").unwrap();
        assert_eq!(dt.precision, DateTimePrecision::Month);
        assert_eq!(dt.offset, None);
    }

    #[test]
    fn time_precisions() {
        assert_eq!(parse_time("T14").unwrap().precision, TimePrecision::Hour);
        assert_eq!(parse_time("14:30").unwrap().precision, TimePrecision::Minute);
        assert_eq!(
            parse_time("14:30:05.9").unwrap().precision,
            TimePrecision::Millisecond
        );
    }
}
