//! Cross-file aggregation with provenance-aware deduplication.
//!
//! Monthly exports overlap: a stay booked in March and amended in April shows
//! up in both files. Aggregation stamps every row with the file it came from
//! and the file's creation timestamp, then keeps the first occurrence of each
//! distinct row, comparing every column except the provenance pair. Feeding a
//! previous aggregation result back in alongside new files is a no-op for the
//! rows it already contains.

use std::collections::HashSet;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use log::info;

use crate::workbook::Frame;

/// Provenance columns appended to every aggregated row, in order.
pub const PROVENANCE_HEADERS: [&str; 2] = ["source_file", "source_file_created_at"];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Origin of one ingested file, stamped onto each of its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStamp {
    pub file: String,
    pub created_at: NaiveDateTime,
}

impl SourceStamp {
    fn cells(&self) -> [String; 2] {
        [
            self.file.clone(),
            self.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }
}

/// Appends the provenance columns to a per-file frame. Frames that already
/// carry them (a previous aggregation output) pass through untouched, which
/// is what makes re-aggregation idempotent.
pub fn stamp(frame: Frame, source: &SourceStamp) -> Frame {
    if has_provenance(&frame.headers) {
        return frame;
    }
    let mut headers = frame.headers;
    headers.extend(PROVENANCE_HEADERS.iter().map(|h| h.to_string()));
    let rows = frame
        .rows
        .into_iter()
        .map(|mut row| {
            row.extend(source.cells());
            row
        })
        .collect();
    Frame { headers, rows }
}

/// Concatenates stamped frames and drops duplicate rows, first occurrence
/// wins. All frames must share the same header row.
pub fn aggregate(frames: Vec<Frame>) -> Result<Frame> {
    let mut frames = frames.into_iter();
    let first = frames
        .next()
        .ok_or_else(|| anyhow!("nothing to aggregate: no input frames"))?;
    if !has_provenance(&first.headers) {
        return Err(anyhow!(
            "aggregation input is missing the provenance columns; stamp frames first"
        ));
    }

    let headers = first.headers.clone();
    let key_width = headers.len() - PROVENANCE_HEADERS.len();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for frame in std::iter::once(first).chain(frames) {
        if frame.headers != headers {
            return Err(anyhow!(
                "aggregation inputs disagree on headers: expected {:?}, found {:?}",
                headers,
                frame.headers
            ));
        }
        for row in frame.rows {
            let key: Vec<String> = row.iter().take(key_width).cloned().collect();
            if seen.insert(key) {
                rows.push(row);
            } else {
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        info!("aggregation dropped {dropped} duplicate row(s)");
    }
    Ok(Frame { headers, rows })
}

fn has_provenance(headers: &[String]) -> bool {
    headers.len() >= PROVENANCE_HEADERS.len()
        && headers[headers.len() - PROVENANCE_HEADERS.len()..]
            .iter()
            .zip(PROVENANCE_HEADERS.iter())
            .all(|(h, p)| h == p)
}
