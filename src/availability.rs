//! Availability calendar reading.
//!
//! The calendar sheet lists one property per row: the identifier first, then
//! an open-ended run of date pairs, each pair being one contiguous window the
//! property was bookable. Available nights inside a reporting window are the
//! clamped, inclusive overlap of each pair with the window.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use itertools::Itertools;
use log::warn;

use crate::{data, workbook::Frame};

/// The reporting window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if to < from {
            return Err(anyhow!("window end {to} precedes window start {from}"));
        }
        Ok(DateWindow { from, to })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAvailability {
    pub property: String,
    pub nights: i64,
}

/// Sums each property's available nights inside `window`. Cells that do not
/// parse as dates end their row's pair run; half-open trailing pairs are
/// ignored with a warning.
pub fn available_nights(frame: &Frame, window: DateWindow) -> Vec<PropertyAvailability> {
    frame
        .rows
        .iter()
        .filter_map(|row| {
            let property = row.first().map(|c| c.trim().to_string())?;
            if property.is_empty() {
                return None;
            }
            let dates: Vec<NaiveDate> = row
                .iter()
                .skip(1)
                .map(|cell| data::parse_date_lenient(cell))
                .while_some()
                .collect();
            if dates.len() % 2 != 0 {
                warn!(
                    "property '{property}' has an unpaired availability date; ignoring it"
                );
            }
            let nights = dates
                .iter()
                .tuples()
                .map(|(start, end)| clamped_nights(*start, *end, window))
                .sum();
            Some(PropertyAvailability { property, nights })
        })
        .collect()
}

/// Inclusive night count of the overlap between one availability pair and
/// the window, floored at zero.
fn clamped_nights(start: NaiveDate, end: NaiveDate, window: DateWindow) -> i64 {
    let from = start.max(window.from);
    let to = end.min(window.to);
    ((to - from).num_days() + 1).max(0)
}
