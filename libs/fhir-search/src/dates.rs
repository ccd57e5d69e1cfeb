//! Search date values
//!
//! A search date is an instant plus the precision the client actually
//! wrote. Values without an offset are interpreted in the server's
//! timezone; emission reproduces the written precision.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::{Error, Result};

/// Precision of a date search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    /// Full date-time, down to whatever sub-day precision was written.
    Full,
}

/// A parsed date search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchDate {
    pub when: chrono::DateTime<FixedOffset>,
    pub precision: DatePrecision,
}

impl SearchDate {
    /// Parse `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or a full date-time with an
    /// optional zone offset; a missing offset uses the server timezone.
    pub fn parse(input: &str, server_tz: FixedOffset) -> Result<Self> {
        let malformed = || Error::MalformedDate(input.to_string());
        let s = input.trim();

        if let Some((date_part, time_part)) = s.split_once('T') {
            let date = parse_date_part(date_part, 10).ok_or_else(malformed)?;
            let (time_body, offset) = split_offset(time_part).ok_or_else(malformed)?;
            let time = parse_time_part(time_body).ok_or_else(malformed)?;
            let tz = offset.unwrap_or(server_tz);
            let when = tz
                .from_local_datetime(&NaiveDateTime::new(date, time))
                .single()
                .ok_or_else(malformed)?;
            return Ok(Self {
                when,
                precision: DatePrecision::Full,
            });
        }

        let precision = match s.len() {
            4 => DatePrecision::Year,
            7 => DatePrecision::Month,
            10 => DatePrecision::Day,
            _ => return Err(malformed()),
        };
        let date = parse_date_part(s, s.len()).ok_or_else(malformed)?;
        let when = server_tz
            .from_local_datetime(&NaiveDateTime::new(
                date,
                NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"),
            ))
            .single()
            .ok_or_else(malformed)?;
        Ok(Self { when, precision })
    }

    /// Render at the written precision.
    pub fn render(&self) -> String {
        match self.precision {
            DatePrecision::Year => self.when.format("%Y").to_string(),
            DatePrecision::Month => self.when.format("%Y-%m").to_string(),
            DatePrecision::Day => self.when.format("%Y-%m-%d").to_string(),
            DatePrecision::Full => self.when.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
        }
    }
}

fn parse_date_part(s: &str, expected_len: usize) -> Option<NaiveDate> {
    if s.len() != expected_len {
        return None;
    }
    match s.len() {
        4 => {
            let year: i32 = all_digits(s)?.parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1)
        }
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn parse_time_part(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn split_offset(rest: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(stripped) = rest.strip_suffix('Z') {
        return Some((stripped, Some(FixedOffset::east_opt(0)?)));
    }
    if let Some(pos) = rest.rfind(['+', '-']) {
        let (body, zone) = rest.split_at(pos);
        if zone.len() == 6 && zone.as_bytes()[3] == b':' {
            let sign = if zone.starts_with('-') { -1 } else { 1 };
            let hours: i32 = zone[1..3].parse().ok()?;
            let minutes: i32 = zone[4..6].parse().ok()?;
            let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
            return Some((body, Some(offset)));
        }
        return None;
    }
    Some((rest, None))
}

fn all_digits(s: &str) -> Option<&str> {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        Some(s)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn precisions_round_trip() {
        for (input, precision) in [
            ("2024", DatePrecision::Year),
            ("2024-12", DatePrecision::Month),
            ("2024-12-25", DatePrecision::Day),
        ] {
            let parsed = SearchDate::parse(input, utc()).unwrap();
            assert_eq!(parsed.precision, precision);
            assert_eq!(parsed.render(), input);
        }
    }

    #[test]
    fn missing_offset_uses_server_timezone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let parsed = SearchDate::parse("2024-12-25T10:30:00", tz).unwrap();
        assert_eq!(parsed.when.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(parsed.render(), "2024-12-25T10:30:00+02:00");
    }

    #[test]
    fn explicit_offset_wins() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let parsed = SearchDate::parse("2024-12-25T10:30:00-05:00", tz).unwrap();
        assert_eq!(parsed.when.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            SearchDate::parse("25-12-2024", utc()),
            Err(Error::MalformedDate(_))
        ));
        assert!(matches!(
            SearchDate::parse("2024-13", utc()),
            Err(Error::MalformedDate(_))
        ));
    }
}
