//! Table export
//!
//! Summary tables are written twice: as CSV inside the workspace and as an
//! `.xlsx` workbook (one sheet named after the table) for distribution.

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Write `df` as CSV with a header row, overwriting `path`
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV: {:?}", path))
}

/// Write `df` to a new workbook with a single sheet, overwriting `path`
///
/// Row 1 holds the column names. Numeric values become numeric cells, nulls
/// stay empty, everything else is written as text.
pub fn write_xlsx(df: &DataFrame, path: &Path, sheet_name: &str) -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet(sheet_name)
        .map_err(|e| anyhow!("Failed to create sheet {}: {}", sheet_name, e))?;

    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let col_num = col_idx as u32 + 1;
        sheet
            .get_cell_mut((col_num, 1))
            .set_value(column.name().to_string());

        for row in 0..df.height() {
            let value = column
                .get(row)
                .with_context(|| format!("Failed to read {}[{}]", column.name(), row))?;
            let cell = sheet.get_cell_mut((col_num, row as u32 + 2));
            match value {
                AnyValue::Null => {}
                AnyValue::String(s) => {
                    cell.set_value(s);
                }
                AnyValue::StringOwned(s) => {
                    cell.set_value(s.to_string());
                }
                other => match other.extract::<f64>() {
                    Some(n) => {
                        cell.set_value_number(n);
                    }
                    None => {
                        cell.set_value(other.to_string());
                    }
                },
            }
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, path).context("write spreadsheet failed")
}
