use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::feedback::{Cell, feedback_header};
use crate::registry::ModelRegistry;
use crate::sink::StoredFeedback;

pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
    /// Rows whose version is not in the registry.
    pub orphaned: usize,
}

/// Writes the feedback corpus to `path`, one worksheet per model version,
/// each headed by that version's column layout.
pub fn export_feedback(
    path: &Path,
    registry: &ModelRegistry,
    rows: &[StoredFeedback],
) -> Result<ExportReport> {
    let mut workbook = Workbook::new();
    let mut sheets = 0usize;
    let mut written = 0usize;

    for entry in registry.versions() {
        let version_rows: Vec<&StoredFeedback> = rows
            .iter()
            .filter(|r| r.version == entry.version())
            .collect();

        let mut header = feedback_header(&entry.model);
        header.push("submitted_at".to_string());

        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(entry.version()))?;
        for (col_idx, name) in header.iter().enumerate() {
            sheet
                .write_string(0, col_idx as u16, name)
                .with_context(|| format!("write header cell {col_idx}"))?;
        }
        for (idx, row) in version_rows.iter().enumerate() {
            let row_idx = (idx + 1) as u32;
            write_cells(sheet, row_idx, &row.cells)?;
            sheet
                .write_string(row_idx, row.cells.len() as u16, &row.submitted_at)
                .with_context(|| format!("write timestamp for row {}", row.id))?;
        }
        sheets += 1;
        written += version_rows.len();
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        sheets,
        rows: written,
        orphaned: rows.len() - written,
    })
}

fn write_cells(worksheet: &mut Worksheet, row_idx: u32, cells: &[Cell]) -> Result<()> {
    for (col_idx, cell) in cells.iter().enumerate() {
        let col = col_idx as u16;
        match cell {
            Cell::Text(s) => worksheet.write_string(row_idx, col, s),
            Cell::Int(n) => worksheet.write_number(row_idx, col, *n as f64),
            Cell::Number(x) => worksheet.write_number(row_idx, col, *x),
        }
        .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
    }
    Ok(())
}

// Worksheet names are capped at 31 chars and may not contain []:*?/\
fn sheet_name(version: &str) -> String {
    let cleaned: String = version
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.is_empty() {
        "feedback".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::sheet_name;

    #[test]
    fn sheet_name_strips_forbidden_chars() {
        assert_eq!(sheet_name("v1"), "v1");
        assert_eq!(sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sheet_name(""), "feedback");
    }
}
