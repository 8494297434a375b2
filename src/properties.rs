//! Property master data.
//!
//! A lookup sheet with one row per managed property carrying its identity
//! and the per-stay cost presets (cleaning, supplies, maintenance) the KPI
//! layer charges against each stay.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use log::warn;

use crate::{data, workbook::Frame};

/// Positional layout of the lookup sheet: name, id, zone, zone coordinates,
/// address, address coordinates, then the per-stay cost presets.
const PROPERTY_WIDTH: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: String,
    pub id: String,
    pub zone: String,
    pub address: String,
    pub cleaning_cost: f64,
    pub supplies_cost: f64,
    pub maintenance_cost: f64,
}

impl PropertyInfo {
    /// Per-stay servicing cost charged once per checkout.
    pub fn stay_cost(&self) -> f64 {
        self.cleaning_cost + self.supplies_cost + self.maintenance_cost
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyLookup {
    by_id: HashMap<String, PropertyInfo>,
}

impl PropertyLookup {
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.column_count() < PROPERTY_WIDTH {
            return Err(anyhow!(
                "property sheet has {} column(s), the lookup layout needs {PROPERTY_WIDTH}",
                frame.column_count()
            ));
        }
        let mut by_id = HashMap::new();
        for row in &frame.rows {
            let cell = |pos: usize| row.get(pos).map(String::as_str).unwrap_or("").trim();
            let id = cell(1).to_string();
            if id.is_empty() {
                continue;
            }
            let cost = |pos: usize| data::parse_decimal(cell(pos)).unwrap_or(0.0);
            // Positions 3 and 5 hold coordinates the pipeline never uses.
            let info = PropertyInfo {
                name: cell(0).to_string(),
                id: id.clone(),
                zone: cell(2).to_string(),
                address: cell(4).to_string(),
                cleaning_cost: cost(6),
                supplies_cost: cost(7),
                maintenance_cost: cost(8),
            };
            if by_id.insert(id.clone(), info).is_some() {
                warn!("property '{id}' listed more than once; keeping the last row");
            }
        }
        Ok(PropertyLookup { by_id })
    }

    pub fn get(&self, id: &str) -> Option<&PropertyInfo> {
        self.by_id.get(id.trim())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Per-stay cost for `id`, falling back to 0 for unknown properties.
    pub fn stay_cost(&self, id: &str) -> f64 {
        match self.get(id) {
            Some(info) => info.stay_cost(),
            None => {
                warn!("no property record for '{id}'; assuming zero stay cost");
                0.0
            }
        }
    }
}
