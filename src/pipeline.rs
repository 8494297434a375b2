//! End-to-end ingestion: sheet to validated, derived, aggregated CSV.
//!
//! Per file: read the stay sheet, drop the totals row, check structure,
//! project to canonical columns, validate semantics, coerce, drop rows with
//! no apartment, derive the financial columns. Per batch: stamp every file's
//! rows with provenance and deduplicate across files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, NaiveDateTime};
use encoding_rs::Encoding;
use log::{info, warn};

use crate::{
    data::Value,
    dedup::{self, SourceStamp},
    derive::{self, FieldIndexes, ZeroDivisionPolicy},
    io_utils, project,
    schema::Schema,
    validate,
    workbook::{self, Frame, SheetSelector},
};

pub const DEFAULT_SHEET: &str = "SHORT STAY";
pub const DEFAULT_HEADER_ROW: usize = 6;
const APARTMENT_ID: &str = "apartment_id";

/// How the batch driver reacts when one file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the batch at the first failing file.
    #[default]
    Abort,
    /// Log the failure, leave the file out, continue with the rest.
    Skip,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub sheet: SheetSelector,
    pub header_row: usize,
    pub encoding: &'static Encoding,
    pub on_error: ErrorPolicy,
    pub zero_division: ZeroDivisionPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            sheet: SheetSelector::Name(DEFAULT_SHEET.to_string()),
            header_row: DEFAULT_HEADER_ROW,
            encoding: encoding_rs::UTF_8,
            on_error: ErrorPolicy::Abort,
            zero_division: ZeroDivisionPolicy::Fail,
        }
    }
}

/// Ingests one export file into a canonical frame with derived columns.
pub fn process_file(path: &Path, schema: &Schema, options: &IngestOptions) -> Result<Frame> {
    info!("processing {path:?}");
    let mut raw = workbook::read_sheet(path, &options.sheet, options.header_row, options.encoding)?;
    raw.drop_trailing_totals();

    validate::check_structure(&raw, schema)
        .with_context(|| format!("Structural check failed for {path:?}"))?;
    let projected = project::project(&raw, schema)?;
    validate::validate_rows(&projected, schema)
        .with_context(|| format!("Semantic validation failed for {path:?}"))?;

    derive_frame(&projected, schema, options)
}

/// Coerces a validated frame and appends the derived columns. Rows without
/// an apartment identifier are administrative filler and are dropped here.
fn derive_frame(projected: &Frame, schema: &Schema, options: &IngestOptions) -> Result<Frame> {
    let kinds = schema.required_kinds();
    let fields = FieldIndexes::resolve(&projected.headers)?;
    let apartment = projected
        .column_index(APARTMENT_ID)
        .ok_or_else(|| anyhow!("canonical column '{APARTMENT_ID}' is missing"))?;

    let mut headers = projected.headers.clone();
    headers.extend(derive::DERIVED_HEADERS.iter().map(|h| h.to_string()));

    let mut rows = Vec::with_capacity(projected.rows.len());
    let mut dropped = 0usize;
    for (idx, raw_row) in projected.rows.iter().enumerate() {
        if raw_row
            .get(apartment)
            .map(|cell| cell.trim().is_empty())
            .unwrap_or(true)
        {
            dropped += 1;
            continue;
        }
        let typed = crate::data::coerce_row(raw_row, &kinds)?;
        let derived = derive::derive_row(&typed, &fields, idx + 1, options.zero_division)?;

        let mut cells: Vec<String> = typed
            .iter()
            .map(|value| value.as_ref().map(Value::as_display).unwrap_or_default())
            .collect();
        cells.extend(derived.to_cells());
        rows.push(cells);
    }
    if dropped > 0 {
        info!("dropped {dropped} row(s) without an apartment identifier");
    }

    Ok(Frame { headers, rows })
}

/// Lists the ingestable files under `input` (or `input` itself), sorted by
/// file name so batch order is stable across filesystems.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(input)
        .with_context(|| format!("Listing {input:?}"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("xlsx") | Some("xlsm") | Some("csv")
            )
        })
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(anyhow!("no .xlsx or .csv files found under {input:?}"));
    }
    Ok(files)
}

/// Processes every input file and aggregates the results with provenance.
pub fn run_batch(input: &Path, schema: &Schema, options: &IngestOptions) -> Result<Frame> {
    let mut frames = Vec::new();
    for path in collect_inputs(input)? {
        let frame = match process_file(&path, schema, options) {
            Ok(frame) => frame,
            Err(err) => match options.on_error {
                ErrorPolicy::Abort => return Err(err),
                ErrorPolicy::Skip => {
                    warn!("skipping {path:?}: {err:#}");
                    continue;
                }
            },
        };
        let stamp = SourceStamp {
            file: file_name(&path),
            created_at: file_created_at(&path)?,
        };
        frames.push(dedup::stamp(frame, &stamp));
    }
    if frames.is_empty() {
        return Err(anyhow!("every input file failed; nothing to aggregate"));
    }
    dedup::aggregate(frames)
}

/// Writes a frame as a delimited file, comma by default.
pub fn write_frame(path: &Path, frame: &Frame, delimiter: u8) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record(frame.headers.iter())
        .context("Writing output headers")?;
    for row in &frame.rows {
        writer.write_record(row.iter()).context("Writing output row")?;
    }
    writer.flush().context("Flushing output")?;
    info!("wrote {} row(s) to {path:?}", frame.rows.len());
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Filesystem creation time of the export, falling back to the modification
/// time where the filesystem does not record creation.
fn file_created_at(path: &Path) -> Result<NaiveDateTime> {
    let metadata =
        fs::metadata(path).with_context(|| format!("Reading metadata for {path:?}"))?;
    let stamp = metadata.created().or_else(|_| metadata.modified()).with_context(|| {
        format!("Filesystem reports no timestamps for {path:?}")
    })?;
    let local: DateTime<Local> = stamp.into();
    Ok(local.naive_local())
}
