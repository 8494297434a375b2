//! Financial KPI snapshot over the canonical stay dataset.
//!
//! Every monetary KPI works on VAT-net figures; the blended OTA commission
//! is attributed to rental and cleaning revenue in proportion to their net
//! share. Any ratio whose denominator is zero reports 0 with a warning, so a
//! month with no activity still produces a complete snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use log::warn;

use crate::{
    data::{self, format_amount},
    derive::VAT_RATE,
    expenses::{LedgerTotals, NetExpense},
    io_utils,
    properties::PropertyLookup,
};

/// Expense sector holding the cleaning purchases.
pub const CLEANING_SECTOR: &str = "PULIZIE";

pub const DEFAULT_DEPRECIATION: f64 = 15_000.0;

/// One stay as read back from the canonical dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StayRow {
    pub apartment_id: String,
    pub stay_nights: i64,
    pub rental_revenue: f64,
    pub cleaning_revenue: f64,
    pub ota_commission: f64,
    pub itw_net_commission: f64,
    pub itw_vat_commission: f64,
    pub owner_gross_commission: f64,
    pub pm_vat_commission: f64,
}

/// Reads the canonical dataset by header name. The commission VAT column is
/// optional in reduced schemas and defaults to 0.
pub fn read_stays(path: &Path) -> Result<Vec<StayRow>> {
    let mut reader =
        io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER, true)?;
    let headers = io_utils::reader_headers(&mut reader, UTF_8)?;
    let position = |name: &str| headers.iter().position(|h| h == name);
    let require = |name: &str| {
        position(name).ok_or_else(|| anyhow!("canonical dataset {path:?} is missing column '{name}'"))
    };

    let apartment = require("apartment_id")?;
    let nights = require("stay_nights")?;
    let rental = require("rental_revenue")?;
    let cleaning = require("cleaning_revenue")?;
    let ota = require("ota_commission")?;
    let itw_net = require("itw_net_commission")?;
    let owner = require("owner_gross_commission")?;
    let pm_vat = require("pm_vat_commission")?;
    let itw_vat = position("itw_vat_commission");

    let mut stays = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading stay row {}", idx + 1))?;
        let cells = io_utils::decode_record(&record, UTF_8)?;
        let cell = |pos: usize| cells.get(pos).map(String::as_str).unwrap_or("");
        let amount = |pos: usize| data::parse_decimal(cell(pos)).unwrap_or(0.0);
        stays.push(StayRow {
            apartment_id: cell(apartment).to_string(),
            stay_nights: cell(nights).trim().parse().unwrap_or(0),
            rental_revenue: amount(rental),
            cleaning_revenue: amount(cleaning),
            ota_commission: amount(ota),
            itw_net_commission: amount(itw_net),
            itw_vat_commission: itw_vat.map(amount).unwrap_or(0.0),
            owner_gross_commission: amount(owner),
            pm_vat_commission: amount(pm_vat),
        });
    }
    Ok(stays)
}

/// Ordered KPI snapshot; insertion order is the reporting order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiSnapshot {
    entries: Vec<(String, f64)>,
}

impl KpiSnapshot {
    fn push(&mut self, name: &str, value: f64) {
        self.entries.push((name.to_string(), data::round2(value)));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// Writes the snapshot as a two-row CSV: names, then values.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
        writer
            .write_record(self.entries.iter().map(|(name, _)| name.as_str()))
            .context("Writing KPI headers")?;
        writer
            .write_record(self.entries.iter().map(|(_, value)| format_amount(*value)))
            .context("Writing KPI values")?;
        writer.flush().context("Flushing KPI output")?;
        Ok(())
    }
}

/// Expense-side inputs, pre-netted by the expense module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFigures {
    pub totals: LedgerTotals,
    pub by_sector: BTreeMap<String, f64>,
}

impl ExpenseFigures {
    pub fn from_expenses(expenses: &[NetExpense]) -> Self {
        ExpenseFigures {
            totals: crate::expenses::totals(expenses),
            by_sector: crate::expenses::sector_totals(expenses),
        }
    }
}

/// Computes the full snapshot. `available_nights` comes from the
/// availability calendar; expense and property inputs are optional and the
/// KPIs depending on them degrade to revenue-side figures when absent.
pub fn compute(
    stays: &[StayRow],
    available_nights: i64,
    expenses: Option<&ExpenseFigures>,
    properties: Option<&PropertyLookup>,
    depreciation: f64,
) -> KpiSnapshot {
    let sum = |f: fn(&StayRow) -> f64| stays.iter().map(f).sum::<f64>();

    let rental_gross = sum(|s| s.rental_revenue);
    let cleaning_gross = sum(|s| s.cleaning_revenue);
    let ota_gross = sum(|s| s.ota_commission);
    let itw_net = sum(|s| s.itw_net_commission);
    let itw_vat = sum(|s| s.itw_vat_commission);
    let owner_gross = sum(|s| s.owner_gross_commission);
    let pm_vat = sum(|s| s.pm_vat_commission);

    let rental_net = rental_gross - pm_vat;
    let cleaning_net = cleaning_gross / VAT_RATE;
    let total_revenue = rental_net + cleaning_net;

    let ota_net = ota_gross / VAT_RATE;
    let ota_on_rental = ota_net * ratio(rental_net, total_revenue, "ota_commission_on_rental");
    let rental_margin = rental_net - ota_on_rental - owner_gross;
    let cleaning_margin = cleaning_net - (ota_net - ota_on_rental);
    let total_margin = rental_margin + cleaning_margin;
    let total_commissions = ota_net + itw_net + owner_gross;

    let ota_vat = ota_net * (VAT_RATE - 1.0);
    let vat_credit = itw_vat + ota_vat;
    let vat_debit = pm_vat;
    let vat_balance = vat_debit - vat_credit;

    let occupied_nights: i64 = stays.iter().map(|s| s.stay_nights.max(0)).sum();
    let free_nights = (available_nights - occupied_nights).max(0);
    let stay_count = stays.len() as f64;
    let occupancy_rate =
        ratio(occupied_nights as f64, available_nights as f64, "occupancy_rate") * 100.0;
    let average_stay_nights = ratio(occupied_nights as f64, stay_count, "average_stay_nights");
    let average_nightly_rate =
        ratio(rental_net, occupied_nights as f64, "average_nightly_rate");
    let average_revenue_per_booking =
        ratio(total_revenue, stay_count, "average_revenue_per_booking");

    let stay_costs = match properties {
        Some(lookup) => stays.iter().map(|s| lookup.stay_cost(&s.apartment_id)).sum(),
        None => 0.0,
    };
    let average_stay_cost = ratio(stay_costs, stay_count, "average_stay_cost");
    let gross_expenses = expenses.map(|e| e.totals.gross).unwrap_or(0.0);
    let vat_expenses = expenses.map(|e| e.totals.vat).unwrap_or(0.0);
    let net_expenses = expenses.map(|e| e.totals.net).unwrap_or(0.0);
    let cleaning_costs = expenses
        .and_then(|e| e.by_sector.get(CLEANING_SECTOR).copied())
        .unwrap_or(0.0);
    let fixed_costs = net_expenses;
    let overhead_costs = fixed_costs - cleaning_costs;
    let variable_costs = total_commissions + stay_costs;
    let total_costs = fixed_costs + variable_costs;

    let ebitda = total_revenue - total_costs;
    let mol = ebitda - depreciation;

    let mut snapshot = KpiSnapshot::default();
    snapshot.push("rental_revenue_net", rental_net);
    snapshot.push("cleaning_revenue_net", cleaning_net);
    snapshot.push("total_revenue", total_revenue);
    snapshot.push("ota_commission_net", ota_net);
    snapshot.push("ota_commission_on_rental", ota_on_rental);
    snapshot.push("rental_margin", rental_margin);
    snapshot.push("cleaning_margin", cleaning_margin);
    snapshot.push("total_margin", total_margin);
    snapshot.push("total_commissions", total_commissions);
    snapshot.push("n_bookings", stay_count);
    snapshot.push("occupied_nights", occupied_nights as f64);
    snapshot.push("available_nights", available_nights as f64);
    snapshot.push("free_nights", free_nights as f64);
    snapshot.push("occupancy_rate", occupancy_rate);
    snapshot.push("average_stay_nights", average_stay_nights);
    snapshot.push("average_nightly_rate", average_nightly_rate);
    snapshot.push("average_revenue_per_booking", average_revenue_per_booking);
    snapshot.push("stay_costs", stay_costs);
    snapshot.push("average_stay_cost", average_stay_cost);
    snapshot.push("gross_expenses", gross_expenses);
    snapshot.push("vat_expenses", vat_expenses);
    snapshot.push("net_expenses", net_expenses);
    snapshot.push("cleaning_costs", cleaning_costs);
    snapshot.push("overhead_costs", overhead_costs);
    snapshot.push("fixed_costs", fixed_costs);
    snapshot.push("variable_costs", variable_costs);
    snapshot.push("total_costs", total_costs);
    // The settlement only opposes PM VAT to the commission-side VAT;
    // recoverable purchase VAT is reported on its own as vat_expenses.
    snapshot.push("vat_debit", vat_debit);
    snapshot.push("vat_credit", vat_credit);
    snapshot.push("vat_balance", vat_balance);
    snapshot.push("depreciation", depreciation);
    snapshot.push("ebitda", ebitda);
    snapshot.push("mol", mol);
    snapshot
}

/// Guarded division: a zero denominator reports 0 instead of poisoning the
/// snapshot with NaN.
fn ratio(numerator: f64, denominator: f64, name: &str) -> f64 {
    if denominator == 0.0 {
        warn!("KPI '{name}' has a zero denominator; reporting 0");
        0.0
    } else {
        numerator / denominator
    }
}
