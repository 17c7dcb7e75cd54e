//! Reporting-period inference.

use chrono::{Datelike, Months, NaiveDate};
use circrep_core::{RawTimestamp, TelemetryRecord};
use serde::Serialize;

use crate::timestamp;

/// Inclusive range of whole calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingPeriod {
    /// From the first day of `earliest`'s month to the last day of `latest`'s month.
    #[must_use]
    pub fn spanning(earliest: NaiveDate, latest: NaiveDate) -> Self {
        let (lo, hi) = if earliest <= latest {
            (earliest, latest)
        } else {
            (latest, earliest)
        };
        Self {
            start: first_of_month(lo),
            end: last_of_month(hi),
        }
    }

    /// The whole calendar month before `today`'s month.
    #[must_use]
    pub fn previous_month(today: NaiveDate) -> Self {
        let this_month = first_of_month(today);
        let prev = this_month
            .checked_sub_months(Months::new(1))
            .unwrap_or(this_month);
        Self::spanning(prev, prev)
    }

    /// Every calendar day in the period, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    #[must_use]
    pub fn day_count(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }
}

/// How far before `today` a telemetry timestamp may lie and still shape the
/// reporting period.
const MAX_MONTHS_BACK: u32 = 120;
/// How far after `today` a telemetry timestamp may lie.
const MAX_MONTHS_AHEAD: u32 = 12;

/// Chooses the reporting period for a batch of records.
///
/// Unparseable timestamps, and timestamps more than ten years before or one
/// year after `today` (placeholder dates such as `0001-01-01`), are logged
/// and ignored. When nothing usable remains the previous calendar month
/// relative to `today` is used.
#[must_use]
pub fn infer_period(records: &[TelemetryRecord], today: NaiveDate) -> ReportingPeriod {
    let earliest = today
        .checked_sub_months(Months::new(MAX_MONTHS_BACK))
        .unwrap_or(NaiveDate::MIN);
    let latest = today
        .checked_add_months(Months::new(MAX_MONTHS_AHEAD))
        .unwrap_or(NaiveDate::MAX);
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;

    for record in records {
        let Some(slot) = timestamp::parse_slot(&record.timestamp) else {
            if record.timestamp != RawTimestamp::Missing {
                tracing::warn!(
                    timestamp = %timestamp::describe(&record.timestamp),
                    "ignoring record with unparseable timestamp"
                );
            }
            continue;
        };
        let date = slot.date();
        if date < earliest || date > latest {
            tracing::warn!(
                timestamp = %timestamp::describe(&record.timestamp),
                %today,
                "ignoring record with implausible timestamp"
            );
            continue;
        }
        bounds = Some(match bounds {
            None => (date, date),
            Some((lo, hi)) => (lo.min(date), hi.max(date)),
        });
    }

    if let Some((lo, hi)) = bounds {
        let period = ReportingPeriod::spanning(lo, hi);
        tracing::debug!(start = %period.start, end = %period.end, "reporting period from telemetry");
        period
    } else {
        let period = ReportingPeriod::previous_month(today);
        tracing::warn!(
            start = %period.start,
            end = %period.end,
            "no usable timestamps; falling back to previous month"
        );
        period
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_at(ts: &str) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: RawTimestamp::Structured(ts.to_string()),
            ..TelemetryRecord::default()
        }
    }

    #[test]
    fn cross_month_span_covers_both_months() {
        let records = vec![
            record_at("2024-02-03 10:00:00.000000"),
            record_at("2024-01-15 08:00:00.000000"),
        ];
        let period = infer_period(&records, date(2024, 6, 1));
        assert_eq!(period.start, date(2024, 1, 1));
        assert_eq!(period.end, date(2024, 2, 29));
        assert_eq!(period.day_count(), 60);
    }

    #[test]
    fn single_month_span() {
        let records = vec![record_at("2023-04-30 23:00:00.000000")];
        let period = infer_period(&records, date(2024, 6, 1));
        assert_eq!(period.start, date(2023, 4, 1));
        assert_eq!(period.end, date(2023, 4, 30));
    }

    #[test]
    fn falls_back_to_previous_month_without_timestamps() {
        let records = vec![TelemetryRecord::default(), record_at("garbage")];
        let period = infer_period(&records, date(2024, 3, 10));
        assert_eq!(period.start, date(2024, 2, 1));
        assert_eq!(period.end, date(2024, 2, 29));
    }

    #[test]
    fn fallback_in_january_uses_previous_december() {
        let period = infer_period(&[], date(2025, 1, 20));
        assert_eq!(period.start, date(2024, 12, 1));
        assert_eq!(period.end, date(2024, 12, 31));
    }

    #[test]
    fn unparseable_records_do_not_widen_the_period() {
        let records = vec![
            record_at("2024-05-02 00:00:00.000000"),
            TelemetryRecord {
                timestamp: RawTimestamp::Text("1999".to_string()),
                ..TelemetryRecord::default()
            },
        ];
        let period = infer_period(&records, date(2024, 6, 1));
        assert_eq!(period.start, date(2024, 5, 1));
        assert_eq!(period.end, date(2024, 5, 31));
    }

    #[test]
    fn placeholder_dates_do_not_stretch_the_period() {
        let records = vec![
            record_at("0001-01-01 00:00:00.000000"),
            record_at("2024-05-10 12:00:00.000000"),
            record_at("9999-12-31 23:00:00.000000"),
        ];
        let period = infer_period(&records, date(2024, 6, 1));
        assert_eq!(period.start, date(2024, 5, 1));
        assert_eq!(period.end, date(2024, 5, 31));
        assert_eq!(period.day_count(), 31);
    }

    #[test]
    fn plausibility_window_is_relative_to_today() {
        let today = date(2024, 6, 15);
        let edge = vec![
            record_at("2014-06-15 00:00:00.000000"),
            record_at("2025-06-15 00:00:00.000000"),
        ];
        let period = infer_period(&edge, today);
        assert_eq!(period.start, date(2014, 6, 1));
        assert_eq!(period.end, date(2025, 6, 30));

        let outside = vec![record_at("2014-06-14 23:00:00.000000")];
        let period = infer_period(&outside, today);
        assert_eq!(period, ReportingPeriod::previous_month(today));
    }

    #[test]
    fn days_iterates_inclusively() {
        let period = ReportingPeriod::spanning(date(2024, 2, 10), date(2024, 2, 10));
        let days: Vec<_> = period.days().collect();
        assert_eq!(days.len(), 29);
        assert_eq!(days.first(), Some(&date(2024, 2, 1)));
        assert_eq!(days.last(), Some(&date(2024, 2, 29)));
    }
}
