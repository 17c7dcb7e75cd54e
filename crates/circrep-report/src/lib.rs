//! Hourly circuit-usage reconciliation and report rendering.
//!
//! Data flows leaf-first: [`period::infer_period`] picks the reporting month,
//! [`merge::derive_defaults`] seeds identifiers, [`grid::HourlyGrid`] lays out
//! every hour of that month, [`merge::merge_records`] overlays telemetry, and
//! [`aggregate::grand_total`] summarises it. [`report::reconcile`] runs the
//! whole chain for one circuit.

pub mod aggregate;
pub mod error;
pub mod export;
pub mod format;
pub mod grid;
pub mod merge;
pub mod period;
pub mod report;
pub mod sheet;
pub mod timestamp;

pub use aggregate::grand_total;
pub use error::{ExportError, SheetError};
pub use export::{CsvExporter, PdfExporter, ReportExporter};
pub use grid::{GridCell, HourlyGrid};
pub use merge::{derive_defaults, merge_records, BatchDefaults};
pub use period::{infer_period, ReportingPeriod};
pub use report::{reconcile, CircuitReport};
pub use sheet::{read_circuit_sheet, CircuitSheet};
