use chrono::NaiveDate;
use circrep_core::{CircuitRow, TelemetryRecord};

use crate::aggregate::grand_total;
use crate::grid::{GridCell, HourlyGrid};
use crate::merge::{derive_defaults, merge_records, BatchDefaults};
use crate::period::{infer_period, ReportingPeriod};

/// Fully reconciled report for one circuit, ready for export.
#[derive(Debug, Clone)]
pub struct CircuitReport {
    pub period: ReportingPeriod,
    pub defaults: BatchDefaults,
    pub grid: HourlyGrid,
    pub grand_total: GridCell,
}

impl CircuitReport {
    /// Grid rows followed by the grand-total row.
    pub fn rows_with_total(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.grid.cells().chain(std::iter::once(&self.grand_total))
    }
}

/// Runs period inference, default derivation, grid construction, merging and
/// aggregation for one circuit's telemetry. Never fails: bad records are
/// skipped and an empty batch yields a zero-filled previous-month report.
#[must_use]
pub fn reconcile(records: &[TelemetryRecord], row: &CircuitRow, today: NaiveDate) -> CircuitReport {
    let period = infer_period(records, today);
    let defaults = derive_defaults(records, row);
    let mut grid = HourlyGrid::build(&period, &defaults);
    let stats = merge_records(&mut grid, records, &defaults);
    let grand_total = grand_total(&grid);

    tracing::debug!(
        node_id = %row.node_id,
        interface_id = %row.interface_id,
        records = records.len(),
        applied = stats.applied,
        cells = grid.cell_count(),
        "reconciled circuit telemetry"
    );

    CircuitReport {
        period,
        defaults,
        grid,
        grand_total,
    }
}
