//! Tolerant parsing of telemetry timestamps.
//!
//! Two shapes are accepted:
//! - structured `{ "date": "YYYY-MM-DD HH:MM:SS[.ffffff]" }`
//! - plain `"DD/MM/YYYY HH"` (optionally `"DD/MM/YYYY HH:MM"`)
//!
//! A plain string in the structured layout is accepted as well. Every parsed
//! value is floored to the start of its hour.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use circrep_core::RawTimestamp;

const STRUCTURED_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Display format of a grid slot, e.g. `2024-01-15 13.00.00`.
pub const SLOT_FORMAT: &str = "%Y-%m-%d %H.%M.%S";

/// Parses a raw timestamp into the hour slot it belongs to.
#[must_use]
pub fn parse_slot(raw: &RawTimestamp) -> Option<NaiveDateTime> {
    let parsed = match raw {
        RawTimestamp::Structured(s) => parse_structured(s),
        RawTimestamp::Text(s) => parse_structured(s).or_else(|| parse_day_first(s)),
        RawTimestamp::Missing | RawTimestamp::Other(_) => None,
    }?;
    floor_to_hour(parsed)
}

/// Renders a raw timestamp for diagnostics.
#[must_use]
pub fn describe(raw: &RawTimestamp) -> String {
    match raw {
        RawTimestamp::Structured(s) => format!("{{\"date\": {s:?}}}"),
        RawTimestamp::Text(s) => format!("{s:?}"),
        RawTimestamp::Missing => "<missing>".to_string(),
        RawTimestamp::Other(s) => s.clone(),
    }
}

#[must_use]
pub fn format_slot(slot: NaiveDateTime) -> String {
    slot.format(SLOT_FORMAT).to_string()
}

fn parse_structured(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    STRUCTURED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_day_first(s: &str) -> Option<NaiveDateTime> {
    let mut parts = s.split_whitespace();
    let date = NaiveDate::parse_from_str(parts.next()?, "%d/%m/%Y").ok()?;
    let time = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (hour, minute) = match time.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (time.parse::<u32>().ok()?, 0),
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(date.and_time(time))
}

fn floor_to_hour(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.date().and_hms_opt(dt.hour(), 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn structured_with_microseconds() {
        let raw = RawTimestamp::Structured("2024-01-15 13:00:00.000000".to_string());
        assert_eq!(parse_slot(&raw), Some(slot("2024-01-15 13:00:00")));
    }

    #[test]
    fn structured_without_fraction_is_floored() {
        let raw = RawTimestamp::Structured("2024-01-15 13:47:12".to_string());
        assert_eq!(parse_slot(&raw), Some(slot("2024-01-15 13:00:00")));
    }

    #[test]
    fn plain_day_first_hour() {
        let raw = RawTimestamp::Text("03/02/2024 07".to_string());
        assert_eq!(parse_slot(&raw), Some(slot("2024-02-03 07:00:00")));
    }

    #[test]
    fn plain_day_first_with_minutes() {
        let raw = RawTimestamp::Text("03/02/2024 23:59".to_string());
        assert_eq!(parse_slot(&raw), Some(slot("2024-02-03 23:00:00")));
    }

    #[test]
    fn plain_string_in_structured_layout() {
        let raw = RawTimestamp::Text("2024-02-03 05:00:00.5".to_string());
        assert_eq!(parse_slot(&raw), Some(slot("2024-02-03 05:00:00")));
    }

    #[test]
    fn rejects_out_of_range_hour_and_garbage() {
        assert_eq!(parse_slot(&RawTimestamp::Text("03/02/2024 24".to_string())), None);
        assert_eq!(parse_slot(&RawTimestamp::Text("yesterday".to_string())), None);
        assert_eq!(parse_slot(&RawTimestamp::Structured("15/01/2024 13".to_string())), None);
        assert_eq!(parse_slot(&RawTimestamp::Missing), None);
        assert_eq!(parse_slot(&RawTimestamp::Other("42".to_string())), None);
    }

    #[test]
    fn slot_format_uses_dots() {
        assert_eq!(format_slot(slot("2024-01-05 09:00:00")), "2024-01-05 09.00.00");
    }
}
