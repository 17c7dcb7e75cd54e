//! One page per day, grand total appended to the last day's table.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};

use super::ReportExporter;
use crate::error::ExportError;
use crate::grid::GridCell;
use crate::report::CircuitReport;

const TITLE: &str = "Customer Interface Summary Report by Hour";
const NO_DATA: &str = "No circuit status data available.";

// US Letter, 0.5" margins.
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN: f32 = 12.7;
const USABLE_W: f32 = PAGE_W - 2.0 * MARGIN;

const COLUMN_FRACTIONS: [f32; 6] = [0.10, 0.25, 0.15, 0.15, 0.175, 0.175];
const HEADER_ROW_H: f32 = 10.0;
const ROW_H: f32 = 8.0;
const CELL_PAD: f32 = 1.5;
const CELL_PT: f32 = 8.0;
const PT_TO_MM: f32 = 0.3528;

const THAI_HEADERS: [&[&str]; 6] = [
    &["รหัสหน่วยงาน"],
    &["ชื่อหน่วยงาน"],
    &["วันที่และเวลา"],
    &["ขนาดBandwidth", "(หน่วย Mbps)"],
    &["ปริมาณการใช้งาน incoming", "(หน่วย bps)"],
    &["ปริมาณการใช้งาน outcoming", "(หน่วย bps)"],
];

const LATIN_HEADERS: [&[&str]; 6] = [
    &["Circuit"],
    &["Name"],
    &["Date/Time"],
    &["Bandwidth", "(Mbps)"],
    &["Incoming", "(bps)"],
    &["Outgoing", "(bps)"],
];

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

/// PDF renderer. Without an embedded TrueType font the built-in Helvetica is
/// used, headings switch to English and non-Latin characters are replaced.
#[derive(Debug, Clone, Default)]
pub struct PdfExporter {
    font: Option<Arc<Vec<u8>>>,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    unicode: bool,
}

impl PdfExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the TrueType font at `path` when it can be read; falls back to
    /// Helvetica otherwise.
    #[must_use]
    pub fn with_font_file(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self {
                font: Some(Arc::new(bytes)),
            },
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "report font unavailable; PDFs will use Helvetica"
                );
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn has_embedded_font(&self) -> bool {
        self.font.is_some()
    }

    fn load_fonts(&self, doc: &PdfDocumentReference) -> Result<Fonts, ExportError> {
        if let Some(bytes) = &self.font {
            let font = doc
                .add_external_font(Cursor::new(bytes.as_slice()))
                .map_err(pdf_err)?;
            return Ok(Fonts {
                regular: font.clone(),
                bold: font,
                unicode: true,
            });
        }
        Ok(Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(pdf_err)?,
            unicode: false,
        })
    }
}

impl ReportExporter for PdfExporter {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn folder(&self) -> &'static str {
        "PDF"
    }

    fn export(&self, report: &CircuitReport, path: &Path) -> Result<(), ExportError> {
        let (doc, first_page, first_layer) =
            PdfDocument::new(TITLE, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let fonts = self.load_fonts(&doc)?;

        let heading = report_heading(report, fonts.unicode);
        let days: Vec<(NaiveDate, Vec<&GridCell>)> = report.grid.days().collect();
        if days.is_empty() {
            let layer = doc.get_page(first_page).get_layer(first_layer);
            put_text(&layer, &fonts, &fonts.regular, NO_DATA, 12.0, MARGIN, PAGE_H - MARGIN - 10.0);
        }

        let last = days.len().saturating_sub(1);
        for (i, (day, cells)) in days.iter().enumerate() {
            let layer = if i == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
                doc.get_page(page).get_layer(layer)
            };
            let total = (i == last).then_some(&report.grand_total);
            draw_day(&layer, &fonts, &heading, *day, cells, total);
        }

        let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
        doc.save(&mut BufWriter::new(file)).map_err(pdf_err)?;
        Ok(())
    }
}

#[allow(clippy::needless_pass_by_value)]
fn pdf_err(e: printpdf::Error) -> ExportError {
    ExportError::Pdf(format!("{e:?}"))
}

fn draw_day(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    heading: &str,
    day: NaiveDate,
    cells: &[&GridCell],
    total: Option<&GridCell>,
) {
    let mut y = PAGE_H - MARGIN - 8.0;
    put_centered(layer, fonts, &fonts.bold, TITLE, 18.0, y);
    y -= 10.0;
    put_centered(layer, fonts, &fonts.regular, heading, 14.0, y);
    y -= 8.0;
    put_centered(layer, fonts, &fonts.regular, &date_heading(day, fonts.unicode), 12.0, y);
    y -= 8.0;

    let xs = column_starts();
    let widths = column_widths();
    let headers = if fonts.unicode {
        THAI_HEADERS
    } else {
        LATIN_HEADERS
    };

    let table_top = y;
    for (col, lines) in headers.iter().enumerate() {
        for (n, line) in lines.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let line_y = y - 4.0 - n as f32 * 3.5;
            let text = fit_text(line, widths[col], CELL_PT);
            put_text(layer, fonts, &fonts.bold, &text, CELL_PT, xs[col] + CELL_PAD, line_y);
        }
    }
    y -= HEADER_ROW_H;
    let mut row_lines = vec![table_top, y];

    for (cell, (show_code, show_name)) in cells.iter().zip(visible_identifiers(cells)) {
        let values = [
            if show_code { cell.circuit_code.as_str() } else { "" },
            if show_name { cell.display_name.as_str() } else { "" },
            cell.timestamp.as_str(),
            cell.bandwidth.as_str(),
            cell.inbound.as_str(),
            cell.outbound.as_str(),
        ];
        for (col, value) in values.iter().enumerate() {
            let text = fit_text(value, widths[col], CELL_PT);
            put_text(layer, fonts, &fonts.regular, &text, CELL_PT, xs[col] + CELL_PAD, y - 5.5);
        }
        y -= ROW_H;
        row_lines.push(y);
    }

    if let Some(total) = total {
        let label_width = widths[..4].iter().sum();
        let label = fit_text(&total.circuit_code, label_width, CELL_PT);
        put_text(layer, fonts, &fonts.bold, &label, CELL_PT, xs[0] + CELL_PAD, y - 5.5);
        put_text(layer, fonts, &fonts.bold, &total.inbound, CELL_PT, xs[4] + CELL_PAD, y - 5.5);
        put_text(layer, fonts, &fonts.bold, &total.outbound, CELL_PT, xs[5] + CELL_PAD, y - 5.5);
        y -= ROW_H;
        row_lines.push(y);
    }

    draw_grid(layer, &row_lines, table_top, y);
}

fn draw_grid(layer: &PdfLayerReference, row_lines: &[f32], top: f32, bottom: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.6, 0.6, 0.6, None)));
    layer.set_outline_thickness(0.5);

    for &y in row_lines {
        layer.add_line(segment((MARGIN, y), (MARGIN + USABLE_W, y)));
    }
    let mut edges = column_starts().to_vec();
    edges.push(MARGIN + USABLE_W);
    for x in edges {
        layer.add_line(segment((x, top), (x, bottom)));
    }
}

fn segment(from: (f32, f32), to: (f32, f32)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
    }
}

fn put_text(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    font: &IndirectFontRef,
    text: &str,
    size: f32,
    x: f32,
    y: f32,
) {
    if text.is_empty() {
        return;
    }
    let text = if fonts.unicode {
        text.to_string()
    } else {
        latin1_only(text)
    };
    layer.use_text(text, size, Mm(x), Mm(y), font);
}

fn put_centered(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    font: &IndirectFontRef,
    text: &str,
    size: f32,
    y: f32,
) {
    let x = ((PAGE_W - estimated_width(text, size)) / 2.0).max(MARGIN);
    put_text(layer, fonts, font, text, size, x, y);
}

fn column_widths() -> [f32; 6] {
    COLUMN_FRACTIONS.map(|f| f * USABLE_W)
}

fn column_starts() -> [f32; 6] {
    let widths = column_widths();
    let mut starts = [MARGIN; 6];
    for i in 1..6 {
        starts[i] = starts[i - 1] + widths[i - 1];
    }
    starts
}

/// Rough average glyph width: half the em size.
#[allow(clippy::cast_precision_loss)]
fn estimated_width(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * PT_TO_MM * 0.5
}

/// Truncates `text` so it fits a column of `width_mm`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn fit_text(text: &str, width_mm: f32, size_pt: f32) -> String {
    let available = (width_mm - 2.0 * CELL_PAD).max(0.0);
    let max_chars = (available / (size_pt * PT_TO_MM * 0.5)).floor() as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

/// For each row, whether the circuit code and display name are printed.
/// Runs of equal values show the value on their first row only.
fn visible_identifiers(cells: &[&GridCell]) -> Vec<(bool, bool)> {
    let mut prev: Option<&GridCell> = None;
    cells
        .iter()
        .map(|cell| {
            let flags = match prev {
                None => (true, true),
                Some(p) => (
                    p.circuit_code != cell.circuit_code,
                    p.display_name != cell.display_name,
                ),
            };
            prev = Some(cell);
            flags
        })
        .collect()
}

/// Every page carries the month the report starts in, even when the period
/// spans several months.
fn report_heading(report: &CircuitReport, unicode: bool) -> String {
    month_heading(report.period.start, unicode)
}

fn month_heading(day: NaiveDate, unicode: bool) -> String {
    if unicode {
        let month = THAI_MONTHS[day.month0() as usize];
        format!("รายงานประจำเดือน {month}")
    } else {
        format!("Monthly report: {}", day.format("%B %Y"))
    }
}

fn date_heading(day: NaiveDate, unicode: bool) -> String {
    if unicode {
        format!("วันที่ {}", day.format("%Y-%m-%d"))
    } else {
        format!("Date: {}", day.format("%Y-%m-%d"))
    }
}

/// Built-in PDF fonts only cover Latin-1.
fn latin1_only(text: &str) -> String {
    text.chars()
        .map(|c| if u32::from(c) <= 0xFF { c } else { '?' })
        .collect()
}
