//! Overlaying sparse telemetry onto the hourly grid.

use circrep_core::{CircuitRow, RawRate, TelemetryRecord};

use crate::format::{bandwidth_label, format_thousands, truncate};
use crate::grid::HourlyGrid;
use crate::timestamp;

/// Identifiers every grid cell starts with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDefaults {
    pub circuit_code: String,
    pub display_name: String,
    pub bandwidth_label: String,
}

/// Derives batch defaults from the first record, falling back to the
/// spreadsheet row for missing identifiers.
#[must_use]
pub fn derive_defaults(records: &[TelemetryRecord], row: &CircuitRow) -> BatchDefaults {
    let first = records.first();
    let non_empty = |v: Option<&String>| v.filter(|s| !s.is_empty()).cloned();

    BatchDefaults {
        circuit_code: non_empty(first.and_then(|r| r.circuit_code.as_ref()))
            .unwrap_or_else(|| row.node_id.clone()),
        display_name: non_empty(first.and_then(|r| r.display_name.as_ref()))
            .unwrap_or_else(|| row.agency_name.clone()),
        bandwidth_label: first
            .and_then(|r| r.bandwidth.as_deref())
            .map(bandwidth_label)
            .unwrap_or_default(),
    }
}

/// Result of merging one batch, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub applied: usize,
    pub unparseable: usize,
    pub out_of_period: usize,
}

/// Applies each record to its hour slot. Later records overwrite earlier ones
/// for the same slot; records that cannot be placed are skipped.
pub fn merge_records(
    grid: &mut HourlyGrid,
    records: &[TelemetryRecord],
    defaults: &BatchDefaults,
) -> MergeStats {
    let mut stats = MergeStats::default();

    for record in records {
        let Some(slot) = timestamp::parse_slot(&record.timestamp) else {
            stats.unparseable += 1;
            continue;
        };
        let Some(cell) = grid.get_mut(slot) else {
            stats.out_of_period += 1;
            continue;
        };

        if let Some(code) = record.circuit_code.as_ref().filter(|s| !s.is_empty()) {
            cell.circuit_code.clone_from(code);
        }
        if let Some(name) = record.display_name.as_ref().filter(|s| !s.is_empty()) {
            cell.display_name.clone_from(name);
        }
        cell.bandwidth = match record.bandwidth.as_deref().filter(|s| !s.is_empty()) {
            Some(descriptor) => bandwidth_label(descriptor),
            None => defaults.bandwidth_label.clone(),
        };

        (cell.raw_inbound, cell.inbound) = interpret_rate(&record.inbound);
        (cell.raw_outbound, cell.outbound) = interpret_rate(&record.outbound);
        stats.applied += 1;
    }

    if stats.unparseable > 0 || stats.out_of_period > 0 {
        tracing::debug!(
            applied = stats.applied,
            unparseable = stats.unparseable,
            out_of_period = stats.out_of_period,
            "some telemetry records were not placed on the grid"
        );
    }
    stats
}

/// Raw integer and display string for one rate value.
fn interpret_rate(rate: &RawRate) -> (i64, String) {
    match rate.as_f64() {
        Some(value) => {
            let raw = truncate(value);
            (raw, format_thousands(raw))
        }
        None => (0, rate.verbatim()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use circrep_core::RawTimestamp;

    use super::*;
    use crate::period::ReportingPeriod;

    fn row() -> CircuitRow {
        CircuitRow {
            row_number: 1,
            node_id: "N-77".to_string(),
            interface_id: "9".to_string(),
            agency_name: "District Office".to_string(),
            ..CircuitRow::default()
        }
    }

    fn january() -> ReportingPeriod {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReportingPeriod::spanning(d, d)
    }

    fn slot(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn record(ts: &str, inbound: RawRate) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: RawTimestamp::Structured(ts.to_string()),
            inbound,
            ..TelemetryRecord::default()
        }
    }

    #[test]
    fn defaults_prefer_first_record_values() {
        let records = vec![TelemetryRecord {
            circuit_code: Some("CID-9".to_string()),
            display_name: Some("Hospital".to_string()),
            bandwidth: Some("FTTx".to_string()),
            ..TelemetryRecord::default()
        }];
        let defaults = derive_defaults(&records, &row());
        assert_eq!(defaults.circuit_code, "CID-9");
        assert_eq!(defaults.display_name, "Hospital");
        assert_eq!(defaults.bandwidth_label, "20 Mbps.");
    }

    #[test]
    fn defaults_fall_back_to_sheet_row() {
        let records = vec![TelemetryRecord {
            circuit_code: Some(String::new()),
            ..TelemetryRecord::default()
        }];
        let defaults = derive_defaults(&records, &row());
        assert_eq!(defaults.circuit_code, "N-77");
        assert_eq!(defaults.display_name, "District Office");
        assert_eq!(defaults.bandwidth_label, "");

        let empty = derive_defaults(&[], &row());
        assert_eq!(empty.circuit_code, "N-77");
    }

    #[test]
    fn zero_records_leave_grid_zeroed() {
        let defaults = derive_defaults(&[], &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        let stats = merge_records(&mut grid, &[], &defaults);
        assert_eq!(stats, MergeStats::default());
        assert!(grid
            .cells()
            .all(|c| c.raw_inbound == 0 && c.inbound == "0" && c.outbound == "0"));
    }

    #[test]
    fn single_record_updates_only_its_slot() {
        let records = vec![record("2024-01-10 14:00:00.000000", RawRate::Number(1_234_567.0))];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        merge_records(&mut grid, &records, &defaults);

        let hit = grid.get(slot("2024-01-10 14:00:00")).unwrap();
        assert_eq!(hit.inbound, "1,234,567");
        assert_eq!(hit.raw_inbound, 1_234_567);

        let touched = grid.cells().filter(|c| c.raw_inbound != 0).count();
        assert_eq!(touched, 1);
        let neighbour = grid.get(slot("2024-01-10 15:00:00")).unwrap();
        assert_eq!(neighbour.inbound, "0");
    }

    #[test]
    fn unparseable_rate_is_kept_verbatim() {
        let records = vec![record(
            "2024-01-02 03:00:00.000000",
            RawRate::Text("N/A".to_string()),
        )];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        merge_records(&mut grid, &records, &defaults);

        let cell = grid.get(slot("2024-01-02 03:00:00")).unwrap();
        assert_eq!(cell.inbound, "N/A");
        assert_eq!(cell.raw_inbound, 0);
        assert_eq!(cell.outbound, "0");
    }

    #[test]
    fn fractional_rates_are_truncated() {
        let records = vec![record(
            "2024-01-02 03:00:00.000000",
            RawRate::Text("2048.99".to_string()),
        )];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        merge_records(&mut grid, &records, &defaults);
        let cell = grid.get(slot("2024-01-02 03:00:00")).unwrap();
        assert_eq!(cell.raw_inbound, 2048);
        assert_eq!(cell.inbound, "2,048");
    }

    #[test]
    fn identifiers_only_overwritten_when_present() {
        let records = vec![
            TelemetryRecord {
                circuit_code: Some("CID-A".to_string()),
                display_name: Some("Alpha".to_string()),
                bandwidth: Some("50M".to_string()),
                timestamp: RawTimestamp::Structured("2024-01-01 00:00:00.0".to_string()),
                ..TelemetryRecord::default()
            },
            TelemetryRecord {
                circuit_code: Some(String::new()),
                display_name: None,
                bandwidth: Some("200 Mbps".to_string()),
                timestamp: RawTimestamp::Structured("2024-01-01 01:00:00.0".to_string()),
                ..TelemetryRecord::default()
            },
        ];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        merge_records(&mut grid, &records, &defaults);

        let second = grid.get(slot("2024-01-01 01:00:00")).unwrap();
        assert_eq!(second.circuit_code, "CID-A");
        assert_eq!(second.display_name, "Alpha");
        assert_eq!(second.bandwidth, "200 Mbps.");
        let untouched = grid.get(slot("2024-01-20 05:00:00")).unwrap();
        assert_eq!(untouched.bandwidth, "50 Mbps.");
    }

    #[test]
    fn out_of_period_and_unparseable_records_are_skipped() {
        let records = vec![
            record("2024-03-01 00:00:00.000000", RawRate::Number(5.0)),
            record("not a date", RawRate::Number(5.0)),
        ];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        let stats = merge_records(&mut grid, &records, &defaults);
        assert_eq!(stats.applied, 0);
        assert_eq!(stats.out_of_period, 1);
        assert_eq!(stats.unparseable, 1);
    }

    #[test]
    fn later_record_wins_for_same_slot() {
        let records = vec![
            record("2024-01-05 06:00:00.000000", RawRate::Number(10.0)),
            record("2024-01-05 06:30:00.000000", RawRate::Number(20.0)),
        ];
        let defaults = derive_defaults(&records, &row());
        let mut grid = HourlyGrid::build(&january(), &defaults);
        merge_records(&mut grid, &records, &defaults);
        assert_eq!(grid.get(slot("2024-01-05 06:00:00")).unwrap().raw_inbound, 20);
    }
}
