use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{ReportExporter, COLUMN_HEADERS};
use crate::error::ExportError;
use crate::report::CircuitReport;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// UTF-8 CSV with a byte-order mark so spreadsheet tools detect Thai text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl ReportExporter for CsvExporter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn folder(&self) -> &'static str {
        "CSV"
    }

    fn export(&self, report: &CircuitReport, path: &Path) -> Result<(), ExportError> {
        let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
        let mut out = BufWriter::new(file);
        out.write_all(UTF8_BOM).map_err(|e| ExportError::io(path, e))?;

        let mut writer = csv::Writer::from_writer(out);
        if report.grid.cell_count() == 0 {
            writer.write_record(["No Data"])?;
        } else {
            writer.write_record(COLUMN_HEADERS)?;
            for cell in report.rows_with_total() {
                writer.write_record([
                    cell.circuit_code.as_str(),
                    cell.display_name.as_str(),
                    cell.timestamp.as_str(),
                    cell.bandwidth.as_str(),
                    cell.inbound.as_str(),
                    cell.outbound.as_str(),
                ])?;
            }
        }
        writer.flush().map_err(|e| ExportError::io(path, e))?;
        Ok(())
    }
}
