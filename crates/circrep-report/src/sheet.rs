//! Reading the uploaded circuit spreadsheet.
//!
//! Workbooks (`.xlsx`, `.xls`, `.ods`) go through `calamine`; `.csv` uploads
//! through the `csv` crate. The first row is the header and must contain every
//! name in [`REQUIRED_COLUMNS`].

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use circrep_core::{CircuitRow, REQUIRED_COLUMNS};

use crate::error::SheetError;

/// Parsed spreadsheet contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitSheet {
    pub rows: Vec<CircuitRow>,
}

impl CircuitSheet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads circuit rows from an uploaded file.
///
/// # Errors
///
/// - [`SheetError::MissingColumns`] naming every absent required header.
/// - [`SheetError::Empty`] when the file has no header row.
/// - [`SheetError::Workbook`] / [`SheetError::Csv`] when the file cannot be decoded.
pub fn read_circuit_sheet(bytes: &[u8], file_name: &str) -> Result<CircuitSheet, SheetError> {
    let table = if is_csv(file_name) {
        read_csv_table(bytes)?
    } else {
        read_workbook_table(bytes)?
    };
    rows_from_table(table)
}

fn is_csv(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn read_workbook_table(bytes: &[u8]) -> Result<Vec<Vec<String>>, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(SheetError::Empty);
    };
    let range = range?;
    Ok(range
        .rows()
        .map(|cells| cells.iter().map(cell_text).collect())
        .collect())
}

fn read_csv_table(bytes: &[u8]) -> Result<Vec<Vec<String>>, SheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record?;
        table.push(record.iter().map(|f| f.trim().to_string()).collect());
    }
    Ok(table)
}

/// Renders a workbook cell as text; whole floats lose their trailing `.0`
/// so numeric IDs read back as typed.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn rows_from_table(table: Vec<Vec<String>>) -> Result<CircuitSheet, SheetError> {
    let mut lines = table.into_iter();
    let header = lines.next().ok_or(SheetError::Empty)?;
    let header: Vec<String> = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let position = |name: &str| header.iter().position(|h| h == name);
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| position(name).is_none())
        .map(|name| (*name).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SheetError::MissingColumns { columns: missing });
    }

    // Every required column is present past this point.
    let idx: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|name| position(name))
        .collect();
    let field = |line: &[String], i: usize| line.get(idx[i]).cloned().unwrap_or_default();

    let rows = lines
        .filter(|line| line.iter().any(|c| !c.is_empty()))
        .enumerate()
        .map(|(n, line)| CircuitRow {
            row_number: n + 1,
            node_id: field(&line, 0),
            interface_id: field(&line, 1),
            ministry: field(&line, 2),
            department: field(&line, 3),
            province: field(&line, 4),
            agency_name: field(&line, 5),
            node_name: field(&line, 6),
        })
        .collect();

    Ok(CircuitSheet { rows })
}
