//! The financial derivation engine.
//!
//! Computes stay duration and the seven derived monetary fields from
//! already-coerced, already-validated cells, in a fixed order. All monetary
//! inputs are VAT-inclusive; the 22% VAT strip (`/ 1.22`) produces the only
//! figures comparable across booking channels. The single blended OTA fee is
//! attributed between rental and cleaning revenue because platforms invoice
//! one combined commission line.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::{
    data::{Value, round2},
    error::LedgerError,
};

pub const VAT_RATE: f64 = 1.22;

/// Canonical names the engine requires in the projected frame.
pub const CHECK_IN: &str = "check_in";
pub const CHECK_OUT: &str = "check_out";
pub const RENTAL_REVENUE: &str = "rental_revenue";
pub const CLEANING_REVENUE: &str = "cleaning_revenue";
pub const OTA_COMMISSION: &str = "ota_commission";
pub const ITW_NET_COMMISSION: &str = "itw_net_commission";
pub const OWNER_GROSS_COMMISSION: &str = "owner_gross_commission";
pub const PM_VAT_COMMISSION: &str = "pm_vat_commission";

/// Derived output columns, in emission order.
pub const DERIVED_HEADERS: [&str; 8] = [
    "stay_nights",
    "total_revenue",
    "total_commissions",
    "total_margin",
    "ota_commission_on_rental",
    "rental_margin",
    "cleaning_margin",
    "month",
];

/// What to do when `rental_revenue + cleaning_revenue == 0` makes the OTA
/// commission split incomputable. The source system divided unguarded; here
/// the failure mode is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroDivisionPolicy {
    /// Reject the file with `DivisionByZeroInDerivation`.
    #[default]
    Fail,
    /// Substitute 0 for the incomputable split and keep going.
    Zero,
}

/// Resolved positions of the engine's input fields inside a projected frame.
#[derive(Debug, Clone)]
pub struct FieldIndexes {
    check_in: usize,
    check_out: usize,
    rental_revenue: usize,
    cleaning_revenue: usize,
    ota_commission: usize,
    itw_net_commission: usize,
    owner_gross_commission: usize,
    pm_vat_commission: usize,
}

impl FieldIndexes {
    pub fn resolve(headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| anyhow!("canonical column '{name}' required for derivation is missing"))
        };
        Ok(FieldIndexes {
            check_in: find(CHECK_IN)?,
            check_out: find(CHECK_OUT)?,
            rental_revenue: find(RENTAL_REVENUE)?,
            cleaning_revenue: find(CLEANING_REVENUE)?,
            ota_commission: find(OTA_COMMISSION)?,
            itw_net_commission: find(ITW_NET_COMMISSION)?,
            owner_gross_commission: find(OWNER_GROSS_COMMISSION)?,
            pm_vat_commission: find(PM_VAT_COMMISSION)?,
        })
    }
}

/// One row's derived fields. Monetary values are `None` when any
/// contributing input was missing; the output layer fills those with 0,
/// matching the source system's final fill step.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub stay_nights: Option<i64>,
    pub total_revenue: Option<f64>,
    pub total_commissions: Option<f64>,
    pub total_margin: Option<f64>,
    pub ota_commission_on_rental: Option<f64>,
    pub rental_margin: Option<f64>,
    pub cleaning_margin: Option<f64>,
    pub month: Option<String>,
}

impl DerivedRow {
    pub fn to_cells(&self) -> Vec<String> {
        let money = |v: &Option<f64>| crate::data::format_amount(v.unwrap_or(0.0));
        vec![
            self.stay_nights.unwrap_or(0).to_string(),
            money(&self.total_revenue),
            money(&self.total_commissions),
            money(&self.total_margin),
            money(&self.ota_commission_on_rental),
            money(&self.rental_margin),
            money(&self.cleaning_margin),
            self.month.clone().unwrap_or_default(),
        ]
    }
}

/// Derives one validated row. `row` is the 1-based data row index used in
/// the division-by-zero error.
pub fn derive_row(
    typed: &[Option<Value>],
    fields: &FieldIndexes,
    row: usize,
    policy: ZeroDivisionPolicy,
) -> Result<DerivedRow, LedgerError> {
    let date = |idx: usize| typed.get(idx).and_then(|v| v.as_ref()).and_then(Value::as_date);
    let num = |idx: usize| typed.get(idx).and_then(|v| v.as_ref()).and_then(Value::as_float);

    let check_in = date(fields.check_in);
    let check_out = date(fields.check_out);
    let rental_revenue = num(fields.rental_revenue);
    let cleaning_revenue = num(fields.cleaning_revenue);
    let ota_commission = num(fields.ota_commission);
    let itw_net_commission = num(fields.itw_net_commission);
    let owner_gross_commission = num(fields.owner_gross_commission);
    let pm_vat_commission = num(fields.pm_vat_commission);

    let stay_nights = match (check_in, check_out) {
        (Some(ci), Some(co)) => Some((co - ci).num_days()),
        _ => None,
    };

    let total_revenue = zip3(rental_revenue, pm_vat_commission, cleaning_revenue)
        .map(|(rental, pm_vat, cleaning)| rental - pm_vat + cleaning / VAT_RATE);

    let total_commissions = zip3(ota_commission, itw_net_commission, owner_gross_commission)
        .map(|(ota, itw, owner)| ota / VAT_RATE + itw + owner);

    let total_margin = zip2(total_revenue, total_commissions).map(|(rev, com)| rev - com);

    let ota_commission_on_rental = match zip3(ota_commission, rental_revenue, cleaning_revenue) {
        Some((ota, rental, cleaning)) => {
            let base = rental + cleaning;
            if base == 0.0 {
                match policy {
                    ZeroDivisionPolicy::Fail => {
                        return Err(LedgerError::DivisionByZeroInDerivation {
                            row,
                            field: "ota_commission_on_rental",
                        });
                    }
                    ZeroDivisionPolicy::Zero => Some(0.0),
                }
            } else {
                Some(ota / VAT_RATE - rental / base)
            }
        }
        None => None,
    };

    let rental_margin = zip3(rental_revenue, owner_gross_commission, pm_vat_commission)
        .and_then(|(rental, owner, pm_vat)| {
            ota_commission_on_rental.map(|split| rental - owner - pm_vat - split)
        });

    let cleaning_margin = zip3(cleaning_revenue, ota_commission, rental_margin)
        .map(|(cleaning, ota, margin)| cleaning / VAT_RATE - (ota - margin));

    let month = check_in.map(|d: NaiveDate| d.format("%Y-%m").to_string());

    Ok(DerivedRow {
        stay_nights,
        total_revenue: total_revenue.map(round2),
        total_commissions: total_commissions.map(round2),
        total_margin: total_margin.map(round2),
        ota_commission_on_rental: ota_commission_on_rental.map(round2),
        rental_margin: rental_margin.map(round2),
        cleaning_margin: cleaning_margin.map(round2),
        month,
    })
}

fn zip2(a: Option<f64>, b: Option<f64>) -> Option<(f64, f64)> {
    Some((a?, b?))
}

fn zip3(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> Option<(f64, f64, f64)> {
    Some((a?, b?, c?))
}
