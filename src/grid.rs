use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{IngestError, Result};

/// A decoded sheet as trimmed string cells. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellGrid {
    rows: Vec<Vec<String>>,
}

impl CellGrid {
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.as_ref().trim().to_string()).collect())
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Out-of-range lookups read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(|c| c.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Workbook loading
// ---------------------------------------------------------------------------

/// Sheets of a workbook, keyed by position.
pub struct Workbook {
    pub sheet_count: usize,
    sheets: Vec<Option<CellGrid>>,
}

impl Workbook {
    pub fn sheet(&self, index: usize) -> Option<&CellGrid> {
        self.sheets.get(index).and_then(Option::as_ref)
    }
}

/// Open a spreadsheet and decode the requested sheets.
///
/// `select` receives the workbook's sheet count and returns the sheet indexes to load.
/// A requested sheet that is absent or cannot be decoded is an error.
pub fn load_workbook<F>(file_path: &Path, select: F) -> Result<Workbook>
where
    F: FnOnce(usize) -> Vec<usize>,
{
    let display = file_path.display().to_string();
    let mut workbook = open_workbook_auto(file_path)
        .map_err(|e| IngestError::Unreadable(format!("{display}: {e}")))?;
    let sheet_count = workbook.sheet_names().len();
    let mut sheets: Vec<Option<CellGrid>> = vec![None; sheet_count];

    for index in select(sheet_count) {
        let range = workbook
            .worksheet_range_at(index)
            .ok_or_else(|| IngestError::MissingSheet {
                file: display.clone(),
                index,
            })?
            .map_err(|e| IngestError::Unreadable(format!("{display} sheet {index}: {e}")))?;
        let grid = CellGrid::from_rows(range.rows().map(|row| row.iter().map(cell_to_string)));
        sheets[index] = Some(grid);
    }

    Ok(Workbook {
        sheet_count,
        sheets,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{f}"),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_dotted(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Render an Excel date serial in the providers' `dd.mm.yyyy` convention.
///
/// Serials outside chrono's date range come back as the raw number, so the
/// date normalizer rejects that column instead of the whole run failing.
pub fn excel_serial_to_dotted(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let date = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
        .zip(serial.is_finite().then(|| chrono::Duration::try_days(serial as i64)).flatten())
        .and_then(|(base, days)| base.checked_add_signed(days));
    match date {
        Some(date) => date.format("%d.%m.%Y").to_string(),
        None => format!("{serial}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    #[test]
    fn test_from_rows_trims_cells() {
        let grid = CellGrid::from_rows(vec![vec!["  a ", "b"], vec!["", " c"]]);
        assert_eq!(grid.cell(0, 0), "a");
        assert_eq!(grid.cell(1, 1), "c");
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_out_of_range_cells_are_empty() {
        let grid = CellGrid::from_rows(vec![vec!["a"]]);
        assert_eq!(grid.cell(0, 5), "");
        assert_eq!(grid.cell(9, 0), "");
        assert!(grid.row(9).is_empty());
    }

    #[test]
    fn test_blank_row_detection() {
        let grid = CellGrid::from_rows(vec![vec!["  ", ""], vec!["", "x"]]);
        assert!(grid.is_blank_row(0));
        assert!(!grid.is_blank_row(1));
        assert!(grid.is_blank_row(7));
    }

    #[test]
    fn test_cell_to_string_numbers() {
        assert_eq!(cell_to_string(&Data::Float(10.0)), "10");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_excel_serial_to_dotted() {
        assert_eq!(excel_serial_to_dotted(45667.0), "10.01.2025");
    }

    #[test]
    fn test_out_of_range_date_serial_falls_back_to_number() {
        let cell = Data::DateTime(ExcelDateTime::new(1.0e9, ExcelDateTimeType::DateTime, false));
        assert_eq!(cell_to_string(&cell), "1000000000");
        assert_eq!(excel_serial_to_dotted(-1.0e12), "-1000000000000");
        assert_eq!(excel_serial_to_dotted(f64::NAN), "NaN");
    }

    #[test]
    fn test_load_workbook_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a spreadsheet").unwrap();
        let err = load_workbook(&path, |_| vec![3]).err().unwrap();
        assert!(matches!(err, IngestError::Unreadable(_)));
    }
}
