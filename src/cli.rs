use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{data, derive::ZeroDivisionPolicy, pipeline};

#[derive(Debug, Parser)]
#[command(author, version, about = "Short-stay rental accounting pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show a schema's canonical column contract
    Columns(ColumnsArgs),
    /// Ingest stay exports into the canonical, validated dataset
    Ingest(IngestArgs),
    /// Clean the expense ledger and net out the VAT lines
    Expenses(ExpensesArgs),
    /// Compute the financial KPI snapshot for a reporting window
    Kpis(KpisArgs),
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Schema file (.yml) describing the export layout
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Render the contract as an elastic table instead of plain lines
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Export file (.xlsx or .csv) or a directory of export files
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Schema file (.yml) describing the export layout
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Destination CSV for the canonical dataset
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Sheet holding the stays, by name or 0-based index
    #[arg(long, default_value = pipeline::DEFAULT_SHEET)]
    pub sheet: String,
    /// 1-based row of the header inside the sheet
    #[arg(long = "header-row", default_value_t = pipeline::DEFAULT_HEADER_ROW)]
    pub header_row: usize,
    /// Character encoding of delimited input files (e.g. 'windows-1252')
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Delimiter for the output file (supports ',', 'tab', ';', '|')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Reaction to a file that fails validation
    #[arg(long = "on-error", default_value = "abort")]
    pub on_error: ErrorPolicyArg,
    /// Reaction to a stay whose revenue base is zero
    #[arg(long = "zero-division", default_value = "fail")]
    pub zero_division: ZeroDivisionArg,
}

#[derive(Debug, Args)]
pub struct ExpensesArgs {
    /// Accounting workbook (.xlsx or .csv) holding the expense ledger
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination CSV for the netted ledger
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Sheet holding the ledger, by name or 0-based index
    #[arg(long, default_value = "3")]
    pub sheet: String,
    /// 1-based row of the header inside the sheet
    #[arg(long = "header-row", default_value_t = 1)]
    pub header_row: usize,
    /// Character encoding of delimited input files (e.g. 'windows-1252')
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the per-sector totals as a table
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct KpisArgs {
    /// Canonical stay dataset produced by `ingest`
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Availability calendar (.xlsx or .csv)
    #[arg(long)]
    pub availability: Option<PathBuf>,
    /// Netted expense ledger produced by `expenses`
    #[arg(long)]
    pub expenses: Option<PathBuf>,
    /// Property master-data sheet (.xlsx or .csv)
    #[arg(long)]
    pub properties: Option<PathBuf>,
    /// Reporting window start (inclusive)
    #[arg(long, value_parser = parse_cli_date)]
    pub from: NaiveDate,
    /// Reporting window end (inclusive)
    #[arg(long, value_parser = parse_cli_date)]
    pub to: NaiveDate,
    /// Yearly depreciation charged against the margin
    #[arg(long, default_value_t = crate::kpis::DEFAULT_DEPRECIATION)]
    pub depreciation: f64,
    /// Destination CSV for the snapshot (stdout table if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Render the snapshot as an elastic table
    #[arg(long = "table")]
    pub table: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ErrorPolicyArg {
    Abort,
    Skip,
}

impl From<ErrorPolicyArg> for pipeline::ErrorPolicy {
    fn from(value: ErrorPolicyArg) -> Self {
        match value {
            ErrorPolicyArg::Abort => pipeline::ErrorPolicy::Abort,
            ErrorPolicyArg::Skip => pipeline::ErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ZeroDivisionArg {
    Fail,
    Zero,
}

impl From<ZeroDivisionArg> for ZeroDivisionPolicy {
    fn from(value: ZeroDivisionArg) -> Self {
        match value {
            ZeroDivisionArg::Fail => ZeroDivisionPolicy::Fail,
            ZeroDivisionArg::Zero => ZeroDivisionPolicy::Zero,
        }
    }
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "," => Ok(b','),
        ";" => Ok(b';'),
        "|" => Ok(b'|'),
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        other if other.len() == 1 => Ok(other.as_bytes()[0]),
        other => Err(format!("Unsupported delimiter '{other}'")),
    }
}

fn parse_cli_date(value: &str) -> Result<NaiveDate, String> {
    data::parse_date_lenient(value)
        .ok_or_else(|| anyhow!("Cannot parse date '{value}'; expected e.g. 2024-03-01"))
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_parser_accepts_named_and_literal_forms() {
        assert_eq!(parse_delimiter(","), Ok(b','));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn cli_date_parser_accepts_both_date_orders() {
        assert_eq!(
            parse_cli_date("2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            parse_cli_date("01/03/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_cli_date("soon").is_err());
    }

    #[test]
    fn ingest_defaults_match_the_export_layout() {
        let cli = Cli::parse_from([
            "rental-ledger",
            "ingest",
            "-i",
            "exports/",
            "-s",
            "schemas/short_stay.yml",
            "-o",
            "out.csv",
        ]);
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.sheet, "SHORT STAY");
                assert_eq!(args.header_row, 6);
                assert_eq!(args.input_encoding, None);
                assert_eq!(args.on_error, ErrorPolicyArg::Abort);
                assert_eq!(args.zero_division, ZeroDivisionArg::Fail);
            }
            other => panic!("expected ingest, got {other:?}"),
        }
    }
}
