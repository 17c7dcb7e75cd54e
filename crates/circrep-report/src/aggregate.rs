use std::cmp::Ordering;

use crate::format::format_thousands;
use crate::grid::{GridCell, HourlyGrid};

/// Label placed in the circuit-code column of the summary row.
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

/// Summary row holding the rounded average inbound/outbound rate over every
/// cell. An empty grid averages to zero.
#[must_use]
pub fn grand_total(grid: &HourlyGrid) -> GridCell {
    let (count, sum_in, sum_out) = grid.cells().fold((0i128, 0i128, 0i128), |(n, i, o), c| {
        (
            n + 1,
            i + i128::from(c.raw_inbound),
            o + i128::from(c.raw_outbound),
        )
    });

    let avg_in = rounded_mean(sum_in, count);
    let avg_out = rounded_mean(sum_out, count);

    GridCell {
        circuit_code: GRAND_TOTAL_LABEL.to_string(),
        display_name: String::new(),
        timestamp: String::new(),
        bandwidth: String::new(),
        inbound: format_thousands(avg_in),
        outbound: format_thousands(avg_out),
        raw_inbound: avg_in,
        raw_outbound: avg_out,
    }
}

/// `sum / count` rounded to nearest, halves to even.
pub(crate) fn rounded_mean(sum: i128, count: i128) -> i64 {
    if count <= 0 {
        return 0;
    }
    let quotient = sum.div_euclid(count);
    let remainder = sum.rem_euclid(count);
    let mean = match (remainder * 2).cmp(&count) {
        Ordering::Greater => quotient + 1,
        Ordering::Equal if quotient % 2 != 0 => quotient + 1,
        _ => quotient,
    };
    i64::try_from(mean).unwrap_or(if mean < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use circrep_core::{RawRate, RawTimestamp, TelemetryRecord};
    use proptest::prelude::*;

    use super::*;
    use crate::merge::{merge_records, BatchDefaults};
    use crate::period::ReportingPeriod;

    fn april() -> ReportingPeriod {
        let d = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        ReportingPeriod::spanning(d, d)
    }

    #[test]
    fn empty_grid_averages_to_zero() {
        let grid = HourlyGrid::build(&april(), &BatchDefaults::default());
        let total = grand_total(&grid);
        assert_eq!(total.circuit_code, "Grand Total");
        assert_eq!(total.inbound, "0");
        assert_eq!(total.outbound, "0");
        assert!(total.display_name.is_empty() && total.timestamp.is_empty());
    }

    #[test]
    fn average_spreads_over_all_cells() {
        let defaults = BatchDefaults::default();
        let mut grid = HourlyGrid::build(&april(), &defaults);
        let records = vec![TelemetryRecord {
            timestamp: RawTimestamp::Structured("2024-04-03 10:00:00.0".to_string()),
            inbound: RawRate::Number(7_200_000.0),
            outbound: RawRate::Number(1_000.0),
            ..TelemetryRecord::default()
        }];
        merge_records(&mut grid, &records, &defaults);

        let total = grand_total(&grid);
        // 30 days × 24 h = 720 cells
        assert_eq!(total.raw_inbound, 10_000);
        assert_eq!(total.inbound, "10,000");
        assert_eq!(total.raw_outbound, 1);
    }

    fn april_with_inbound(value: f64) -> GridCell {
        let defaults = BatchDefaults::default();
        let mut grid = HourlyGrid::build(&april(), &defaults);
        let records = vec![TelemetryRecord {
            timestamp: RawTimestamp::Structured("2024-04-15 00:00:00.0".to_string()),
            inbound: RawRate::Number(value),
            ..TelemetryRecord::default()
        }];
        merge_records(&mut grid, &records, &defaults);
        grand_total(&grid)
    }

    #[test]
    fn half_unit_average_rounds_to_even() {
        // 360 / 720 = 0.5
        let total = april_with_inbound(360.0);
        assert_eq!(total.raw_inbound, 0);
        assert_eq!(total.inbound, "0");

        // 1080 / 720 = 1.5
        let total = april_with_inbound(1_080.0);
        assert_eq!(total.raw_inbound, 2);

        // 1800 / 720 = 2.5
        let total = april_with_inbound(1_800.0);
        assert_eq!(total.raw_inbound, 2);
    }

    #[test]
    fn rounding_ties_go_to_even() {
        assert_eq!(rounded_mean(1, 2), 0);
        assert_eq!(rounded_mean(3, 2), 2);
        assert_eq!(rounded_mean(5, 2), 2);
        assert_eq!(rounded_mean(7, 2), 4);
        assert_eq!(rounded_mean(-1, 2), 0);
        assert_eq!(rounded_mean(-3, 2), -2);
        assert_eq!(rounded_mean(-5, 2), -2);
        assert_eq!(rounded_mean(4, 3), 1);
        assert_eq!(rounded_mean(5, 3), 2);
        assert_eq!(rounded_mean(-5, 3), -2);
        assert_eq!(rounded_mean(0, 0), 0);
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn float_mean(sum: i128, count: usize) -> i64 {
        (sum as f64 / count as f64).round_ties_even() as i64
    }

    proptest! {
        #[test]
        fn rounded_mean_matches_float_rounding(
            values in prop::collection::vec(0i64..1_000_000_000, 1..800)
        ) {
            let sum: i128 = values.iter().map(|v| i128::from(*v)).sum();
            let count = i128::try_from(values.len()).unwrap();
            prop_assert_eq!(rounded_mean(sum, count), float_mean(sum, values.len()));
        }

        #[test]
        fn grand_total_averages_every_slot(
            year in 2000i32..2030,
            month in 1u32..=12,
            extra_months in 0u32..3,
            samples in prop::collection::vec((0u64..90, 0u32..24, 0u32..2_000), 0..60),
        ) {
            let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
            let end = start.checked_add_months(chrono::Months::new(extra_months)).unwrap();
            let period = ReportingPeriod::spanning(start, end);
            let defaults = BatchDefaults::default();
            let mut grid = HourlyGrid::build(&period, &defaults);

            let records: Vec<TelemetryRecord> = samples
                .iter()
                .map(|(day, hour, value)| {
                    let date = start + chrono::Days::new(*day);
                    TelemetryRecord {
                        timestamp: RawTimestamp::Structured(format!(
                            "{} {hour:02}:00:00.0",
                            date.format("%Y-%m-%d")
                        )),
                        inbound: RawRate::Number(f64::from(*value)),
                        outbound: RawRate::Number(f64::from(*value / 3)),
                        ..TelemetryRecord::default()
                    }
                })
                .collect();
            merge_records(&mut grid, &records, &defaults);

            prop_assert_eq!(grid.cell_count(), period.day_count() * 24);
            let sum_in: i128 = grid.cells().map(|c| i128::from(c.raw_inbound)).sum();
            let sum_out: i128 = grid.cells().map(|c| i128::from(c.raw_outbound)).sum();

            let total = grand_total(&grid);
            prop_assert_eq!(total.raw_inbound, float_mean(sum_in, grid.cell_count()));
            prop_assert_eq!(total.raw_outbound, float_mean(sum_out, grid.cell_count()));
            prop_assert_eq!(total.inbound, format_thousands(total.raw_inbound));
        }
    }
}
