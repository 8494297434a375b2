//! Sheet reading for `.xlsx` workbooks and `.csv` files.
//!
//! A CSV file is treated as a single-sheet workbook so the pipeline can be
//! exercised without binary fixtures. All cells surface as trimmed strings;
//! type coercion happens later against the schema.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Reader, Xlsx, open_workbook};
use encoding_rs::Encoding;

use crate::io_utils;

/// Selects a sheet by name or 0-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Name(String),
    Index(usize),
}

impl SheetSelector {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.parse::<usize>() {
            Ok(index) => SheetSelector::Index(index),
            Err(_) => SheetSelector::Name(trimmed.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            SheetSelector::Name(name) => format!("sheet '{name}'"),
            SheetSelector::Index(index) => format!("sheet #{index}"),
        }
    }
}

/// A raw positional frame: one header row plus untyped string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Frame {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Drops the trailing totals row the export appends, recognized by a
    /// first cell starting with "totali" (case-insensitive).
    pub fn drop_trailing_totals(&mut self) {
        let drop = self
            .rows
            .last()
            .and_then(|row| row.first())
            .map(|cell| cell.trim().to_lowercase().starts_with("totali"))
            .unwrap_or(false);
        if drop {
            self.rows.pop();
        }
    }
}

/// Reads one sheet with its header at `header_row` (1-based). Rows above the
/// header are discarded; fully blank rows are skipped; every data row is
/// padded to the header width. `encoding` only applies to delimited files;
/// xlsx cells are already text.
pub fn read_sheet(
    path: &Path,
    selector: &SheetSelector,
    header_row: usize,
    encoding: &'static Encoding,
) -> Result<Frame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" => read_xlsx_sheet(path, selector, header_row),
        "csv" | "tsv" => read_csv_sheet(path, header_row, encoding),
        other => Err(anyhow!(
            "Unsupported workbook format '{other}' for {path:?}; expected .xlsx or .csv"
        )),
    }
}

fn read_xlsx_sheet(path: &Path, selector: &SheetSelector, header_row: usize) -> Result<Frame> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let sheet_names = workbook.sheet_names();
    let sheet_name = match selector {
        SheetSelector::Name(name) => sheet_names
            .iter()
            .find(|candidate| candidate.as_str() == name)
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "{} not found in {path:?} (available: {})",
                    selector.describe(),
                    sheet_names.join(", ")
                )
            })?,
        SheetSelector::Index(index) => sheet_names
            .get(*index)
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "{} out of range in {path:?} ({} sheet(s))",
                    selector.describe(),
                    sheet_names.len()
                )
            })?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Reading {} from {path:?}", selector.describe()))?;

    let mut rows = range
        .rows()
        .skip(header_row.saturating_sub(1))
        .map(|row| {
            row.iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect::<Vec<_>>()
        });
    let headers = rows
        .next()
        .ok_or_else(|| anyhow!("{} in {path:?} has no header row", selector.describe()))?;
    let width = headers.len();
    let data = rows
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Frame {
        headers,
        rows: data,
    })
}

fn read_csv_sheet(path: &Path, header_row: usize, encoding: &'static Encoding) -> Result<Frame> {
    let delimiter = io_utils::resolve_delimiter(path, None);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, false)?;

    let mut records = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", idx + 1))?;
        records.push(io_utils::decode_record(&record, encoding)?);
    }

    let mut iter = records.into_iter().skip(header_row.saturating_sub(1));
    let headers = iter
        .next()
        .ok_or_else(|| anyhow!("{path:?} has no header row at line {header_row}"))?;
    let width = headers.len();
    let rows = iter
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(Frame { headers, rows })
}
