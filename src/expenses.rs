//! Expense ledger cleanup and VAT netting.
//!
//! The accounting export lists each purchase as a cost line followed by its
//! VAT line, booked on the dedicated VAT account. VAT lines arrive without a
//! date or sector of their own and inherit both from the cost line above.
//! Netting subtracts each VAT line from its cost line so sector totals and
//! the cost KPIs work on net figures.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use log::{debug, warn};

use crate::{
    data::{self, format_amount},
    io_utils,
    workbook::Frame,
};

/// Account code the export books VAT lines on.
pub const VAT_ACCOUNT_CODE: &str = "59.01.01";

/// Positions (0-based) of the ledger fields inside the raw sheet:
/// account code, description, amount, total amount, date, sector,
/// associated property.
const LEDGER_POSITIONS: [usize; 7] = [1, 3, 4, 5, 8, 9, 10];

const OUTPUT_HEADERS: [&str; 8] = [
    "date",
    "account_code",
    "description",
    "sector",
    "property",
    "total_amount",
    "net_amount",
    "vat_amount",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub account_code: String,
    pub description: String,
    /// Line amount; VAT lines book the tax itself here.
    pub amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub date: Option<NaiveDate>,
    pub sector: String,
    pub property: String,
}

impl ExpenseRecord {
    pub fn is_vat_line(&self) -> bool {
        self.account_code == VAT_ACCOUNT_CODE
    }
}

/// One cost line with its VAT stripped out.
#[derive(Debug, Clone, PartialEq)]
pub struct NetExpense {
    pub date: Option<NaiveDate>,
    pub account_code: String,
    pub description: String,
    pub sector: String,
    pub property: String,
    pub total_amount: f64,
    pub net_amount: f64,
    pub vat_amount: f64,
}

/// Ledger-wide totals after netting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerTotals {
    pub net: f64,
    pub vat: f64,
    pub gross: f64,
}

/// Extracts the ledger fields from the raw sheet by position.
pub fn read_ledger(frame: &Frame) -> Result<Vec<ExpenseRecord>> {
    let max = LEDGER_POSITIONS[LEDGER_POSITIONS.len() - 1];
    if frame.column_count() <= max {
        return Err(anyhow!(
            "expense sheet has {} column(s), ledger layout needs at least {}",
            frame.column_count(),
            max + 1
        ));
    }
    let records = frame
        .rows
        .iter()
        .map(|row| {
            let cell = |pos: usize| row.get(pos).map(String::as_str).unwrap_or("").trim();
            ExpenseRecord {
                account_code: cell(LEDGER_POSITIONS[0]).to_string(),
                description: cell(LEDGER_POSITIONS[1]).to_string(),
                amount: data::parse_decimal(cell(LEDGER_POSITIONS[2])),
                total_amount: data::parse_decimal(cell(LEDGER_POSITIONS[3])),
                date: data::parse_date_lenient(cell(LEDGER_POSITIONS[4])),
                sector: cell(LEDGER_POSITIONS[5]).to_string(),
                property: cell(LEDGER_POSITIONS[6]).to_string(),
            }
        })
        .collect();
    Ok(records)
}

/// Drops cost lines without an amount and lets each VAT line inherit the
/// date and sector of the cost line directly above it.
pub fn clean_ledger(records: Vec<ExpenseRecord>) -> Vec<ExpenseRecord> {
    let mut cleaned: Vec<ExpenseRecord> = Vec::with_capacity(records.len());
    for mut record in records {
        if record.is_vat_line() {
            if let Some(previous) = cleaned.last() {
                if record.date.is_none() {
                    record.date = previous.date;
                }
                if record.sector.is_empty() {
                    record.sector = previous.sector.clone();
                }
            }
            cleaned.push(record);
        } else if record.total_amount.is_some() {
            cleaned.push(record);
        }
    }
    cleaned
}

/// Pairs every cost line with the VAT line that follows it, producing net
/// amounts. A cost line with no trailing VAT line is fully deductible-free
/// and passes through with VAT 0.
pub fn net_expenses(records: &[ExpenseRecord]) -> Vec<NetExpense> {
    let mut netted = Vec::new();
    let mut iter = records.iter().peekable();
    while let Some(record) = iter.next() {
        if record.is_vat_line() {
            warn!(
                "unpaired VAT line on {:?} ({}) skipped",
                record.date, record.description
            );
            continue;
        }
        let total = record.total_amount.unwrap_or(0.0);
        // The tax itself sits in the VAT line's amount column, not its total.
        let vat = match iter.peek() {
            Some(next) if next.is_vat_line() => {
                let vat_line = iter.next().unwrap_or(record);
                vat_line.amount.unwrap_or(0.0)
            }
            _ => 0.0,
        };
        netted.push(NetExpense {
            date: record.date,
            account_code: record.account_code.clone(),
            description: record.description.clone(),
            sector: record.sector.clone(),
            property: record.property.clone(),
            total_amount: data::round2(total),
            net_amount: data::round2(total - vat),
            vat_amount: data::round2(vat),
        });
    }
    debug!("netted {} expense line(s)", netted.len());
    netted
}

/// Net spend per sector, sorted by sector name.
pub fn sector_totals(expenses: &[NetExpense]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for expense in expenses {
        *totals.entry(expense.sector.clone()).or_default() += expense.net_amount;
    }
    for value in totals.values_mut() {
        *value = data::round2(*value);
    }
    totals
}

pub fn totals(expenses: &[NetExpense]) -> LedgerTotals {
    let mut sums = LedgerTotals::default();
    for expense in expenses {
        sums.net += expense.net_amount;
        sums.vat += expense.vat_amount;
        sums.gross += expense.total_amount;
    }
    LedgerTotals {
        net: data::round2(sums.net),
        vat: data::round2(sums.vat),
        gross: data::round2(sums.gross),
    }
}

/// Writes the netted ledger as a canonical CSV.
pub fn write_netted(path: &Path, expenses: &[NetExpense]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(OUTPUT_HEADERS.iter())
        .context("Writing expense headers")?;
    for expense in expenses {
        writer
            .write_record([
                expense
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                expense.account_code.clone(),
                expense.description.clone(),
                expense.sector.clone(),
                expense.property.clone(),
                format_amount(expense.total_amount),
                format_amount(expense.net_amount),
                format_amount(expense.vat_amount),
            ])
            .with_context(|| format!("Writing expense line '{}'", expense.description))?;
    }
    writer.flush().context("Flushing expense output")?;
    Ok(())
}

/// Reads a netted ledger back from its CSV form.
pub fn read_netted(path: &Path) -> Result<Vec<NetExpense>> {
    let mut reader = io_utils::open_csv_reader_from_path(
        path,
        io_utils::DEFAULT_CSV_DELIMITER,
        true,
    )?;
    let headers = io_utils::reader_headers(&mut reader, encoding_rs::UTF_8)?;
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("netted ledger {path:?} is missing column '{name}'"))
    };
    let date = position("date")?;
    let code = position("account_code")?;
    let description = position("description")?;
    let sector = position("sector")?;
    let property = position("property")?;
    let total = position("total_amount")?;
    let net = position("net_amount")?;
    let vat = position("vat_amount")?;

    let mut expenses = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record =
            record.with_context(|| format!("Reading netted ledger row {}", idx + 1))?;
        let cells = io_utils::decode_record(&record, encoding_rs::UTF_8)?;
        let cell = |pos: usize| cells.get(pos).map(String::as_str).unwrap_or("");
        let amount = |pos: usize| data::parse_decimal(cell(pos)).unwrap_or(0.0);
        expenses.push(NetExpense {
            date: data::parse_date_lenient(cell(date)),
            account_code: cell(code).to_string(),
            description: cell(description).to_string(),
            sector: cell(sector).to_string(),
            property: cell(property).to_string(),
            total_amount: amount(total),
            net_amount: amount(net),
            vat_amount: amount(vat),
        });
    }
    Ok(expenses)
}
