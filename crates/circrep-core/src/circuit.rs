//! Circuit rows read from the uploaded spreadsheet.

use serde::{Deserialize, Serialize};

/// Header names every uploaded sheet must carry, in display order.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "NodeID",
    "Interface ID",
    "กระทรวง / สังกัด",
    "กรม / สังกัด",
    "จังหวัด",
    "ชื่อหน่วยงาน",
    "Node Name",
];

/// One spreadsheet row: the identifiers needed to query a circuit plus the
/// organisational hierarchy used to lay out its output files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitRow {
    /// 1-based data row number (the header row is not counted).
    pub row_number: usize,
    pub node_id: String,
    pub interface_id: String,
    pub ministry: String,
    pub department: String,
    pub province: String,
    pub agency_name: String,
    pub node_name: String,
}

impl CircuitRow {
    /// Both identifiers are required to query the telemetry service.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.node_id.is_empty() && !self.interface_id.is_empty()
    }

    /// Name shown in job outcomes and logs.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.node_name.is_empty() {
            format!("{}_{}", self.node_id, self.interface_id)
        } else {
            self.node_name.clone()
        }
    }

    /// Output sub-directories (ministry / department / province / agency).
    ///
    /// Empty levels are skipped so a missing value never produces an empty
    /// path segment.
    #[must_use]
    pub fn folder_components(&self) -> Vec<String> {
        [
            &self.ministry,
            &self.department,
            &self.province,
            &self.agency_name,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| sanitize_path_component(s))
        .collect()
    }

    /// File name stem (without extension) for this circuit's artifacts.
    #[must_use]
    pub fn file_stem(&self) -> String {
        sanitize_path_component(&self.display_name())
    }
}

/// Replaces characters that are unsafe in file names with `_`.
///
/// Path traversal segments (`.` and `..`) are also neutralised.
#[must_use]
pub fn sanitize_path_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
