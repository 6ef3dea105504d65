use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::RVError;
use crate::tableview::{RowSource, ValueKind};

#[derive(Debug, PartialEq)]
enum FileType {
    Json,
}

/// Metadata of the analysed binary, shown in the title area.
#[derive(Debug, Clone, Deserialize)]
pub struct BinaryInfo {
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub stripped: bool,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub entry_point: u64,
}

/// One detected function. The disassembly listing is optional, not every
/// analysis run disassembles.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub start_addr: u64,
    pub end_addr: u64,
    #[serde(default)]
    pub invocation_entry: usize,
    #[serde(default)]
    pub jmp: usize,
    #[serde(default)]
    pub disassembly: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    pub binary: BinaryInfo,
    pub functions: Vec<FunctionRecord>,
}

pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ValueKind,
}

/// Fixed column layout of the functions table. Column 0 is the filter
/// column.
pub static FUNCTION_COLUMNS: [ColumnSpec; 6] = [
    ColumnSpec { name: "Function", kind: ValueKind::Text },
    ColumnSpec { name: "Start", kind: ValueKind::Numeric },
    ColumnSpec { name: "End", kind: ValueKind::Numeric },
    ColumnSpec { name: "Size", kind: ValueKind::Numeric },
    ColumnSpec { name: "Calls", kind: ValueKind::Numeric },
    ColumnSpec { name: "Jumps", kind: ValueKind::Numeric },
];

impl Report {
    pub fn load(path: &Path) -> Result<Self, RVError> {
        let start_time = Instant::now();
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RVError::FileNotFound,
            ErrorKind::PermissionDenied => RVError::PermissionDenied,
            _ => RVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(RVError::LoadingFailed("Not a file!".into()));
        }

        match Self::detect_file_type(path)? {
            FileType::Json => {}
        }

        let raw = fs::read_to_string(path)?;
        let report: Report = serde_json::from_str(&raw)?;

        info!(
            "Loaded report for \"{}\" with {} functions in {}ms",
            report.binary.file_name,
            report.functions.len(),
            start_time.elapsed().as_millis()
        );
        Ok(report)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, RVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("JSON") => Ok(FileType::Json),
            _ => Err(RVError::UnknownFileType),
        }
    }
}

#[derive(Debug, Clone)]
struct ReportRow {
    cells: Vec<String>,
    visible: bool,
}

/// The report's functions materialized as table rows. Owns the visibility
/// flags and the physical row order.
#[derive(Debug, Clone)]
pub struct ReportRows {
    rows: Vec<ReportRow>,
}

impl ReportRows {
    pub fn from_report(report: &Report) -> Self {
        let rows = report
            .functions
            .iter()
            .map(|f| ReportRow {
                cells: vec![
                    scrub(&f.name),
                    format!("{:#x}", f.start_addr),
                    format!("{:#x}", f.end_addr),
                    f.end_addr.saturating_sub(f.start_addr).to_string(),
                    f.invocation_entry.to_string(),
                    f.jmp.to_string(),
                ],
                visible: true,
            })
            .collect();
        debug!("Materialized {} table rows", report.functions.len());
        ReportRows { rows }
    }

    pub fn column_count(&self) -> usize {
        FUNCTION_COLUMNS.len()
    }

    /// Widest cell per column, used for the render width calculation.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = FUNCTION_COLUMNS.iter().map(|c| c.name.len()).collect();
        for row in self.rows.iter() {
            for (idx, cell) in row.cells.iter().enumerate() {
                if idx < widths.len() && cell.chars().count() > widths[idx] {
                    widths[idx] = cell.chars().count();
                }
            }
        }
        widths
    }
}

impl RowSource for ReportRows {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.cells.get(column))
            .map(|s| s.as_str())
    }

    fn is_visible(&self, row: usize) -> bool {
        self.rows.get(row).map(|r| r.visible).unwrap_or(false)
    }

    fn set_visible(&mut self, row: usize, visible: bool) {
        if let Some(r) = self.rows.get_mut(row) {
            r.visible = visible;
        }
    }

    fn reorder(&mut self, order: &[usize]) {
        let mut taken: Vec<Option<ReportRow>> = self.rows.drain(..).map(Some).collect();
        self.rows = order
            .iter()
            .map(|&idx| taken[idx].take().expect("reorder expects a permutation"))
            .collect();
    }
}

// Cells render on a single terminal line.
fn scrub(value: &str) -> String {
    value.replace("\r\n", " ↵ ").replace("\n", " ↵ ")
}
