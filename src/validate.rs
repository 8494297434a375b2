//! Structural and semantic validation.
//!
//! The structural check runs against the raw frame before any renaming; the
//! semantic check runs against the projected frame and accumulates every
//! violation in one pass before the caller is notified. No row reaches the
//! derivation engine until its file passes both.

use anyhow::{Context, Result};
use encoding_rs::UTF_8;
use log::debug;
use tempfile::NamedTempFile;

use crate::{
    data,
    error::{LedgerError, NUMERIC_CEILING, ValidationReport, ViolationKind},
    io_utils,
    schema::{ColumnKind, ColumnSpec, Schema, disambiguate},
    workbook::Frame,
};

/// Checks column-count and header-name parity between the raw frame and the
/// full schema. Expected labels get pandas-style `.1`/`.2` suffixing before
/// comparison, mirroring what a positional reader does to duplicates.
pub fn check_structure(frame: &Frame, schema: &Schema) -> Result<(), LedgerError> {
    let expected = disambiguate(&schema.source_headers());
    if expected.len() != frame.column_count() {
        return Err(LedgerError::ColumnCountMismatch {
            expected: expected.len(),
            found: frame.column_count(),
        });
    }
    let found = disambiguate(&frame.headers);
    for (idx, (want, got)) in expected.iter().zip(found.iter()).enumerate() {
        if want != got {
            return Err(LedgerError::HeaderMismatch {
                position: idx + 1,
                expected: want.clone(),
                found: got.clone(),
            });
        }
    }
    Ok(())
}

/// Row-level semantic validation of a projected frame.
///
/// The frame is spooled to a transient on-disk CSV and re-read row by row,
/// so the checks see exactly the serialized representation later stages
/// consume. The temp file is dropped on every exit path.
pub fn validate_rows(frame: &Frame, schema: &Schema) -> Result<()> {
    let specs = schema.required_specs();
    debug_assert_eq!(specs.len(), frame.column_count());

    let feed = NamedTempFile::new().context("Creating validator feed file")?;
    {
        let mut writer = io_utils::open_csv_writer(feed.path(), io_utils::DEFAULT_CSV_DELIMITER)?;
        writer
            .write_record(frame.headers.iter())
            .context("Writing validator feed headers")?;
        for row in &frame.rows {
            writer
                .write_record(row.iter())
                .context("Writing validator feed row")?;
        }
        writer.flush().context("Flushing validator feed")?;
    }

    let mut reader =
        io_utils::open_csv_reader_from_path(feed.path(), io_utils::DEFAULT_CSV_DELIMITER, true)?;
    let mut report = ValidationReport::default();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record =
            record.with_context(|| format!("Reading validator feed row {}", row_idx + 1))?;
        let cells = io_utils::decode_record(&record, UTF_8)?;
        for (col_idx, spec) in specs.iter().enumerate() {
            let value = cells.get(col_idx).map(String::as_str).unwrap_or("");
            let column = frame
                .headers
                .get(col_idx)
                .map(String::as_str)
                .unwrap_or(spec.rename.as_str());
            check_cell(value, spec, row_idx + 1, column, &mut report);
        }
    }
    debug!(
        "semantic validation finished: {} row(s), {} violation(s)",
        frame.rows.len(),
        report.len()
    );

    report.into_result()?;
    Ok(())
}

/// Applies one column's rule set to one cell. Empty cells always pass: the
/// missing sentinel is legitimate and handled downstream.
fn check_cell(
    value: &str,
    spec: &ColumnSpec,
    row: usize,
    column: &str,
    report: &mut ValidationReport,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return;
    }
    match &spec.datatype {
        ColumnKind::String => {}
        ColumnKind::Numeric { can_be_negative } => match data::parse_decimal(trimmed) {
            None => report.push(
                ViolationKind::MissingRequiredValue,
                row,
                column,
                format!("expected a numeric value, found '{trimmed}'"),
            ),
            Some(parsed) => {
                if !can_be_negative && parsed < 0.0 {
                    report.push(
                        ViolationKind::NegativeValue,
                        row,
                        column,
                        format!("value is negative: {parsed}"),
                    );
                } else if parsed.abs() > NUMERIC_CEILING {
                    report.push(
                        ViolationKind::ValueTooHigh,
                        row,
                        column,
                        format!("value is too high: {parsed}"),
                    );
                }
            }
        },
        ColumnKind::Date { format } => {
            if data::parse_date(trimmed, format).is_none() {
                report.push(
                    ViolationKind::InvalidDate,
                    row,
                    column,
                    format!("cannot parse '{trimmed}' with format '{format}'"),
                );
            }
        }
    }
}
